//! Events a server reports to its attached listeners.
//!
//! [`Server::poll`](crate::server::Server::poll) turns transport activity into
//! [`ServerEvent`]s; the listener then hands each one to every attached
//! [`EventSink`] in attachment order.

use super::ConnectionId;

/// Something that happened on a server during one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A peer completed the WebSocket handshake.
    Opened(ConnectionId),

    /// A peer connection went away.
    Closed(ConnectionId),

    /// A text frame arrived. The payload is passed through verbatim.
    Message {
        /// Connection the frame arrived on.
        connection: ConnectionId,
        /// Frame payload.
        text: String,
    },

    /// A server-wide transport failure, not tied to one connection.
    Error(String),
}

impl ServerEvent {
    /// Invokes the matching callback on `sink`.
    pub fn deliver(&self, sink: &dyn EventSink) {
        match self {
            Self::Opened(id) => sink.on_open(*id),
            Self::Closed(id) => sink.on_close(*id),
            Self::Message { text, .. } => sink.on_message(text),
            Self::Error(description) => sink.on_error(description),
        }
    }
}

/// Receiver of inbound events, implemented by whatever owns a listener.
///
/// Callbacks run synchronously on the control thread inside
/// [`Listener::poll`](crate::listener::Listener::poll), after the server
/// borrow has been released, so an implementation may call back into its
/// listener (for example to reply). Methods take `&self`; sinks that record
/// state use interior mutability.
pub trait EventSink {
    /// Called once per received text frame.
    fn on_message(&self, text: &str);

    /// Called for server-wide transport errors.
    fn on_error(&self, description: &str);

    /// Called when a peer connects.
    fn on_open(&self, _connection: ConnectionId) {}

    /// Called when a peer disconnects.
    fn on_close(&self, _connection: ConnectionId) {}
}

/// Sink that drops every event. Useful for send-only owners.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_message(&self, _text: &str) {}

    fn on_error(&self, _description: &str) {}
}

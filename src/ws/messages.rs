//! Messages exchanged between transport tasks and the control thread.
//!
//! Transport tasks run on a server's private runtime and never touch server
//! state directly. They report what happened as [`TransportEvent`]s, and the
//! control thread writes to them through a [`ConnectionHandle`].

use tokio::sync::mpsc;

use crate::domain::ConnectionId;
use crate::error::SharedWsError;

/// Activity reported by the transport, drained by `Server::poll`.
#[derive(Debug)]
pub enum TransportEvent {
    /// Handshake completed; `handle` writes to the new connection.
    Opened {
        /// Newly allocated connection identifier.
        id: ConnectionId,
        /// Outbound queue for this connection.
        handle: ConnectionHandle,
    },
    /// A text frame arrived.
    Message {
        /// Connection the frame arrived on.
        id: ConnectionId,
        /// Frame payload, verbatim.
        text: String,
    },
    /// The connection task finished.
    Closed {
        /// Connection that went away.
        id: ConnectionId,
    },
    /// Server-wide failure (accept loop, failed upgrade).
    Error(String),
}

/// Instruction for a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one text frame.
    Text(String),
    /// Send a normal-closure close frame and stop.
    Close,
}

/// Write side of one connection as seen from the control thread.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle together with the receiver the connection task owns.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues one text frame for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::SendFailure`] if the connection task has
    /// already finished.
    pub fn send_text(&self, id: ConnectionId, text: &str) -> Result<(), SharedWsError> {
        self.tx
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| SharedWsError::SendFailure(id))
    }

    /// Asks the connection task to close with status 1000.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::CloseError`] if the connection task has
    /// already finished.
    pub fn close(&self, id: ConnectionId) -> Result<(), SharedWsError> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| SharedWsError::CloseError {
                connection: id,
                reason: "connection task already finished".to_string(),
            })
    }
}

//! Owner-held attachment to a shared server.
//!
//! A [`Listener`] is what a host object holds. It is not network-addressable
//! itself; it is a capability to poll and broadcast on a [`SharedServer`]
//! plus the registration of the owner's [`EventSink`].

use std::rc::Rc;

use serde::Serialize;

use super::encoding::{Atom, encode};
use crate::domain::{EventSink, ListenerId, Port};
use crate::error::SharedWsError;
use crate::server::{BroadcastReport, Registry, SharedServer};

/// One owner's attachment to the server on a port.
///
/// Dropping a `Listener` detaches it. When the last listener of a port
/// detaches, the server is closed and removed from its registry.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    port: Port,
    registry: Registry,
    server: Option<SharedServer>,
    poll_budget: usize,
    separator: char,
}

impl Listener {
    /// Attaches to the server on `port`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::BindFailure`] if a new server had to be
    /// created and the port could not be bound.
    pub fn attach(
        registry: &Registry,
        port: Port,
        sink: Rc<dyn EventSink>,
    ) -> Result<Self, SharedWsError> {
        let server = registry.acquire(port)?;
        let id = registry.next_listener_id();
        server.borrow_mut().attach(id, sink);

        let config = registry.config();
        tracing::debug!(%id, %port, "listener attached");

        Ok(Self {
            id,
            port,
            registry: registry.clone(),
            server: Some(server),
            poll_budget: config.poll_budget,
            separator: config.separator,
        })
    }

    /// Detaches from the server. Calling it again is a no-op.
    pub fn detach(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };
        let was_last = server.borrow_mut().detach(self.id);
        tracing::debug!(id = %self.id, port = %self.port, was_last, "listener detached");
        if was_last {
            self.registry.release(&server);
        }
    }

    /// This attachment's identifier.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// The port this listener was attached to.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Returns `true` until [`Listener::detach`] is called.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.server.is_some()
    }

    /// Number of peers currently connected to the shared server.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.server
            .as_ref()
            .map_or(0, |server| server.borrow().connections().len())
    }

    /// Current per-poll event cap.
    #[must_use]
    pub const fn poll_budget(&self) -> usize {
        self.poll_budget
    }

    /// Changes the per-poll event cap.
    pub fn set_poll_budget(&mut self, poll_budget: usize) {
        self.poll_budget = poll_budget;
    }

    /// Changes the separator used by [`Listener::send_values`].
    pub fn set_separator(&mut self, separator: char) {
        self.separator = separator;
    }

    /// Advances the shared server by up to the configured event cap and
    /// dispatches the resulting events to every attached sink.
    ///
    /// Returns the number of events processed.
    pub fn poll(&self) -> usize {
        self.poll_with_budget(self.poll_budget)
    }

    /// Like [`Listener::poll`] with an explicit event cap.
    pub fn poll_with_budget(&self, max_events: usize) -> usize {
        let Some(server) = &self.server else {
            return 0;
        };

        // Release the borrow before dispatch so sinks may call back in
        let (events, sinks) = {
            let mut server = server.borrow_mut();
            let events = server.poll(max_events);
            (events, server.sinks())
        };

        for event in &events {
            for sink in &sinks {
                event.deliver(&**sink);
            }
        }
        events.len()
    }

    /// Broadcasts `text` to every peer of the shared server.
    pub fn send(&self, text: &str) -> BroadcastReport {
        match &self.server {
            Some(server) => server.borrow().broadcast(text),
            None => BroadcastReport::default(),
        }
    }

    /// Encodes `values` (led by an optional `tag`) and broadcasts the result.
    pub fn send_values(&self, tag: Option<&str>, values: &[Atom]) -> BroadcastReport {
        self.send(&encode(tag, values, self.separator))
    }

    /// Encodes an untagged list of values and broadcasts the result.
    pub fn send_list(&self, values: &[Atom]) -> BroadcastReport {
        self.send_values(None, values)
    }

    /// Serializes `value` as JSON and broadcasts it as one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::Serialization`] if `value` cannot be
    /// represented as JSON.
    pub fn send_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<BroadcastReport, SharedWsError> {
        let text = serde_json::to_string(value)?;
        Ok(self.send(&text))
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.detach();
    }
}

//! Set of currently open peer connections for one server.
//!
//! Membership only changes when the control thread applies an open or close
//! transport event during [`crate::server::Server::poll`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::ConnectionId;
use crate::ws::messages::ConnectionHandle;

/// One open connection and the queue used to write to it.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Outbound queue owned by the connection task.
    pub handle: ConnectionHandle,
    /// When the handshake completed.
    pub opened_at: DateTime<Utc>,
}

/// Open connections of a server, ordered by [`ConnectionId`].
///
/// Ordering by identifier means broadcast order follows accept order.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    entries: BTreeMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly opened connection. Returns `false` if the identifier
    /// was already present, in which case the old handle is replaced.
    pub fn insert(&mut self, id: ConnectionId, handle: ConnectionHandle) -> bool {
        let entry = ConnectionEntry {
            handle,
            opened_at: Utc::now(),
        };
        self.entries.insert(id, entry).is_none()
    }

    /// Removes a closed connection, returning its entry if it was present.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(&id)
    }

    /// Returns `true` if `id` is currently open.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no connection is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers of all open connections in broadcast order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries.keys().copied().collect()
    }

    /// Iterates over open connections in broadcast order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &ConnectionEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Removes and returns every connection, leaving the set empty.
    pub fn drain(&mut self) -> Vec<(ConnectionId, ConnectionEntry)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

//! Port-keyed directory of live servers.
//!
//! [`Registry`] maps each [`Port`] to at most one [`SharedServer`]. It is an
//! explicit value rather than a process global, so independent registries
//! can coexist (one per host context, or one per test).
//!
//! # Concurrency
//!
//! All mutation happens on the host's single control thread. The registry is
//! `!Send` by construction (`Rc`/`RefCell`), so that contract is enforced by
//! the compiler instead of a lock.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::instance::{Server, SharedServer};
use crate::config::HostConfig;
use crate::domain::{ListenerId, Port};
use crate::error::SharedWsError;

/// Get-or-create directory of servers keyed by port.
///
/// Cloning a `Registry` yields another handle to the same directory.
/// Servers are only created and released through
/// [`Listener`](crate::listener::Listener) attach and detach, so a
/// registered server always has at least one listener.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Rc<RefCell<RegistryInner>>,
}

#[derive(Debug)]
struct RegistryInner {
    servers: HashMap<Port, SharedServer>,
    config: HostConfig,
    next_listener: u64,
}

impl Registry {
    /// Creates an empty registry whose servers use `config`.
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                servers: HashMap::new(),
                config,
                next_listener: 1,
            })),
        }
    }

    /// Returns a copy of the configuration servers are created with.
    #[must_use]
    pub fn config(&self) -> HostConfig {
        self.inner.borrow().config.clone()
    }

    /// Returns the server for `port`, creating and binding one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::BindFailure`] if a new server had to be
    /// created and its port could not be bound. No entry is recorded in
    /// that case.
    pub(crate) fn acquire(&self, port: Port) -> Result<SharedServer, SharedWsError> {
        if let Some(existing) = self.inner.borrow().servers.get(&port) {
            return Ok(Rc::clone(existing));
        }

        let config = self.config();
        let server = Rc::new(RefCell::new(Server::open(port, &config)?));
        self.inner
            .borrow_mut()
            .servers
            .insert(port, Rc::clone(&server));
        Ok(server)
    }

    /// Removes `server` from the directory and closes it.
    ///
    /// Called once the server's last listener has detached. Returns `false`
    /// without doing anything if the entry is already gone or the port now
    /// maps to a different server.
    pub(crate) fn release(&self, server: &SharedServer) -> bool {
        let port = server.borrow().port();
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let registered = inner
                .servers
                .get(&port)
                .is_some_and(|current| Rc::ptr_eq(current, server));
            if registered {
                inner.servers.remove(&port)
            } else {
                None
            }
        };

        let Some(removed) = removed else {
            return false;
        };
        removed.borrow_mut().close();
        tracing::info!(%port, "released server");
        true
    }

    /// Returns the live server for `port`, if any.
    #[must_use]
    pub fn get(&self, port: Port) -> Option<SharedServer> {
        self.inner.borrow().servers.get(&port).map(Rc::clone)
    }

    /// Returns `true` if a server is registered for `port`.
    #[must_use]
    pub fn contains(&self, port: Port) -> bool {
        self.inner.borrow().servers.contains_key(&port)
    }

    /// Ports with a live server, ascending.
    #[must_use]
    pub fn ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = self.inner.borrow().servers.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Returns the number of live servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().servers.len()
    }

    /// Returns `true` if no server is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().servers.is_empty()
    }

    /// Allocates an identifier for a new listener attachment.
    pub fn next_listener_id(&self) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId::from_raw(inner.next_listener);
        inner.next_listener += 1;
        id
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

//! One bound WebSocket transport plus its open-connection set.
//!
//! A [`Server`] owns a private current-thread tokio runtime. The accept loop
//! and every connection are tasks on that runtime, and the runtime only runs
//! while the control thread is inside [`Server::poll`], [`Server::broadcast`]
//! or [`Server::close`]. Each of those drives it for a fixed number of
//! scheduler rounds and never parks waiting for I/O, so no call can stall the
//! host.

use std::cell::RefCell;
use std::fmt;
use std::net::SocketAddr;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};

use crate::config::HostConfig;
use crate::domain::{ConnectionSet, EventSink, IdAllocator, ListenerId, Port, ServerEvent};
use crate::error::SharedWsError;
use crate::ws;
use crate::ws::handler::TransportState;
use crate::ws::messages::TransportEvent;

/// A server shared by every listener attached to its port.
pub type SharedServer = Rc<RefCell<Server>>;

/// Outcome of a broadcast.
///
/// Per-connection failures are collected here and logged; they never abort
/// delivery to the remaining connections.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// One [`SharedWsError::SendFailure`] per connection that was already gone.
    pub failures: Vec<SharedWsError>,
}

impl BroadcastReport {
    /// Returns `true` if no connection failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owner-side sink registered on a server.
struct Attachment {
    id: ListenerId,
    sink: Rc<dyn EventSink>,
}

/// A WebSocket transport bound to one port.
pub struct Server {
    port: Port,
    connections: ConnectionSet,
    listeners: Vec<Attachment>,
    events_rx: mpsc::Receiver<TransportEvent>,
    #[cfg(test)]
    events_tx: mpsc::Sender<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    runtime: Option<Runtime>,
    local_addr: SocketAddr,
    pump_rounds: usize,
    close_drain_budget: usize,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("port", &self.port)
            .field("local_addr", &self.local_addr)
            .field("connections", &self.connections.len())
            .field(
                "listeners",
                &self.listeners.iter().map(|a| a.id).collect::<Vec<_>>(),
            )
            .field("closed", &self.is_closed())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Server {
    /// Binds `port` and starts accepting WebSocket handshakes on it.
    ///
    /// Binding is synchronous; nothing is left allocated on failure.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::BindFailure`] if the port cannot be bound
    /// or the transport runtime cannot be built.
    pub fn open(port: Port, config: &HostConfig) -> Result<Self, SharedWsError> {
        let bind_err = |err: std::io::Error| SharedWsError::bind(port.get(), &err);

        let addr = SocketAddr::new(config.bind_ip, port.get());
        let std_listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_listener.local_addr().map_err(bind_err)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(bind_err)?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(std_listener).map_err(bind_err)?
        };

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = ws::router(TransportState {
            events: events_tx.clone(),
            ids: IdAllocator::new(),
        });

        let serve_errors = events_tx.clone();
        runtime.spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                let _ = serve_errors
                    .send(TransportEvent::Error(format!("accept loop stopped: {err}")))
                    .await;
            }
        });

        tracing::info!(%port, %local_addr, "created server");

        Ok(Self {
            port,
            connections: ConnectionSet::new(),
            listeners: Vec::new(),
            events_rx,
            #[cfg(test)]
            events_tx,
            shutdown: Some(shutdown_tx),
            runtime: Some(runtime),
            local_addr,
            pump_rounds: config.pump_rounds,
            close_drain_budget: config.close_drain_budget,
            created_at: Utc::now(),
        })
    }

    /// The port this server is registered under.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// The address the transport is actually bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// When the server was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Currently open connections.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Transport events waiting for the next poll. Never exceeds the
    /// configured event capacity.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events_rx.len()
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` once [`Server::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.runtime.is_none()
    }

    /// Registers a listener's sink. Fan-out follows attachment order.
    pub fn attach(&mut self, id: ListenerId, sink: Rc<dyn EventSink>) {
        self.listeners.push(Attachment { id, sink });
    }

    /// Removes a listener's sink.
    ///
    /// Returns `true` if this removed the last listener, meaning the caller
    /// must release the server from its registry.
    pub fn detach(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|a| a.id != id);
        before != self.listeners.len() && self.listeners.is_empty()
    }

    /// Sinks of all attached listeners, in attachment order.
    #[must_use]
    pub fn sinks(&self) -> Vec<Rc<dyn EventSink>> {
        self.listeners.iter().map(|a| Rc::clone(&a.sink)).collect()
    }

    /// Processes at most `max_events` pending transport events.
    ///
    /// Never blocks: the transport gets a bounded amount of scheduler time
    /// and the call returns as soon as the queue is empty. Open and close
    /// events update the connection set before being returned.
    pub fn poll(&mut self, max_events: usize) -> Vec<ServerEvent> {
        let Some(runtime) = &self.runtime else {
            return Vec::new();
        };
        pump(runtime, self.pump_rounds);

        let mut events = Vec::new();
        while events.len() < max_events {
            let Ok(event) = self.events_rx.try_recv() else {
                break;
            };
            events.push(self.apply(event));
        }
        events
    }

    /// Sends `text` as one text frame to every open connection.
    ///
    /// A connection that has already gone away yields a
    /// [`SharedWsError::SendFailure`] in the report and is skipped.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let Some(runtime) = &self.runtime else {
            return report;
        };

        for (id, entry) in self.connections.iter() {
            match entry.handle.send_text(id, text) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        port = %self.port,
                        code = err.error_code(),
                        error = %err,
                        "broadcast send failed"
                    );
                    report.failures.push(err);
                }
            }
        }

        if report.delivered > 0 {
            pump(runtime, self.pump_rounds);
        }
        report
    }

    /// Closes every connection, stops accepting, drains once, and releases
    /// the transport. Idempotent.
    pub fn close(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        tracing::info!(
            port = %self.port,
            connections = self.connections.len(),
            "closing server"
        );

        for (id, entry) in self.connections.drain() {
            if let Err(err) = entry.handle.close(id) {
                tracing::warn!(port = %self.port, code = err.error_code(), error = %err, "close error");
            }
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        pump(&runtime, self.pump_rounds);
        let mut drained = 0;
        while drained < self.close_drain_budget {
            match self.events_rx.try_recv() {
                // Handshake finished after teardown started
                Ok(TransportEvent::Opened { id, handle }) => {
                    if let Err(err) = handle.close(id) {
                        tracing::warn!(port = %self.port, code = err.error_code(), error = %err, "close error");
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
            drained += 1;
        }
        // Flush close frames queued during the drain
        pump(&runtime, self.pump_rounds);
        tracing::debug!(port = %self.port, drained, "close drain finished");

        runtime.shutdown_background();
    }

    fn apply(&mut self, event: TransportEvent) -> ServerEvent {
        match event {
            TransportEvent::Opened { id, handle } => {
                self.connections.insert(id, handle);
                tracing::debug!(port = %self.port, %id, open = self.connections.len(), "peer connected");
                ServerEvent::Opened(id)
            }
            TransportEvent::Closed { id } => {
                let open_for_ms = self
                    .connections
                    .remove(id)
                    .map(|entry| (Utc::now() - entry.opened_at).num_milliseconds());
                tracing::debug!(
                    port = %self.port,
                    %id,
                    open = self.connections.len(),
                    ?open_for_ms,
                    "peer disconnected"
                );
                ServerEvent::Closed(id)
            }
            TransportEvent::Message { id, text } => ServerEvent::Message {
                connection: id,
                text,
            },
            TransportEvent::Error(description) => {
                let notice = SharedWsError::TransportError(description);
                tracing::warn!(
                    port = %self.port,
                    code = notice.error_code(),
                    error = %notice,
                    "transport error"
                );
                ServerEvent::Error(notice.to_string())
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: TransportEvent) -> bool {
        self.events_tx.try_send(event).is_ok()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}

/// Gives the transport runtime `rounds` scheduler passes without parking.
fn pump(runtime: &Runtime, rounds: usize) {
    runtime.block_on(async move {
        for _ in 0..rounds {
            tokio::task::yield_now().await;
        }
    });
}

//! shared-ws demo host.
//!
//! Attaches two listeners to the configured port, which share a single
//! server, then runs a cooperative tick loop: poll, echo every inbound
//! message back to all peers, sleep.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use shared_ws::config::HostConfig;
use shared_ws::domain::{ConnectionId, EventSink, NullSink, Port};
use shared_ws::listener::{Atom, Listener};
use shared_ws::server::Registry;

/// Collects inbound text until the host loop gets to it.
#[derive(Debug, Default)]
struct EchoInbox {
    pending: RefCell<Vec<String>>,
}

impl EventSink for EchoInbox {
    fn on_message(&self, text: &str) {
        tracing::info!(%text, "received");
        self.pending.borrow_mut().push(text.to_string());
    }

    fn on_error(&self, description: &str) {
        tracing::error!(%description, "server error");
    }

    fn on_open(&self, connection: ConnectionId) {
        tracing::info!(%connection, "peer connected");
    }

    fn on_close(&self, connection: ConnectionId) {
        tracing::info!(%connection, "peer disconnected");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = HostConfig::from_env()?;
    let port = Port::new(config.default_port).inspect_err(|err| {
        tracing::error!(code = err.error_code(), error = %err, "invalid port");
    })?;
    let tick = Duration::from_millis(config.tick_ms);
    tracing::info!(%port, bind_ip = %config.bind_ip, "starting shared-ws host");

    let registry = Registry::new(config);
    let inbox = Rc::new(EchoInbox::default());

    // Two owners on one port share one server
    let echo = Listener::attach(&registry, port, Rc::clone(&inbox) as Rc<dyn EventSink>)?;
    let heartbeat = Listener::attach(&registry, port, Rc::new(NullSink))?;
    tracing::info!(%port, ports = ?registry.ports(), "listeners attached");

    let mut ticks: u64 = 0;
    loop {
        echo.poll();

        let pending = std::mem::take(&mut *inbox.pending.borrow_mut());
        for text in pending {
            echo.send(&text);
        }

        ticks += 1;
        if ticks % 1_000 == 0 {
            let peers = i64::try_from(heartbeat.connection_count()).unwrap_or(i64::MAX);
            let tick_count = i64::try_from(ticks).unwrap_or(i64::MAX);
            heartbeat.send_values(
                Some("heartbeat"),
                &[Atom::from(tick_count), Atom::from(peers)],
            );
        }

        std::thread::sleep(tick);
    }
}

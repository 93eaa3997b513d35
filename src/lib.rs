//! # shared-ws
//!
//! Port-keyed WebSocket servers for hosts that run a single cooperative
//! control thread and must never block.
//!
//! Any number of [`Listener`]s may attach to the same port. They share one
//! [`Server`]: one bound transport and one set of open connections. The
//! server lives exactly as long as at least one listener is attached.
//!
//! ## Architecture
//!
//! ```text
//! Host objects (owners)
//!     │  attach / poll / send / detach
//!     ├── Listener (listener/)      ── EventSink callbacks back to the owner
//!     │
//!     ├── Registry (server/)        port → Server, get-or-create, release
//!     ├── Server (server/)          ConnectionSet, bounded poll, broadcast
//!     │
//!     └── WS transport (ws/)        axum upgrade + per-connection tasks on a
//!                                   private current-thread tokio runtime
//! ```
//!
//! ## Scheduling
//!
//! No thread is spawned. Network progress happens only inside
//! [`Listener::poll`] (and briefly inside broadcasts and teardown), each of
//! which gives the transport a bounded slice of scheduler time and processes
//! at most a configured number of events. The types here are `!Send` and
//! must not be used from inside another tokio runtime.

pub mod config;
pub mod domain;
pub mod error;
pub mod listener;
pub mod server;
pub mod ws;

pub use config::HostConfig;
pub use domain::{ConnectionId, EventSink, NullSink, Port, ServerEvent};
pub use error::SharedWsError;
pub use listener::{Atom, Listener};
pub use server::{BroadcastReport, Registry, Server};

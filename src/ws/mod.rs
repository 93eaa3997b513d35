//! WebSocket transport: upgrade handling and per-connection tasks.
//!
//! Everything in here runs on a server's private runtime. The only way in
//! or out is the channel pair described in [`messages`].

pub mod connection;
pub mod handler;
pub mod messages;

use axum::Router;

use handler::{TransportState, ws_handler};

/// Builds the router served on a server's port.
pub fn router(state: TransportState) -> Router {
    Router::new().fallback(ws_handler).with_state(state)
}

//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use super::connection::run_connection;
use super::messages::TransportEvent;
use crate::domain::IdAllocator;

/// State shared by every request handled on one server's port.
#[derive(Debug, Clone)]
pub struct TransportState {
    /// Bounded channel drained by the control thread.
    pub events: mpsc::Sender<TransportEvent>,
    /// Connection identifier allocator.
    pub ids: IdAllocator,
}

/// Upgrades any request path to a WebSocket connection.
///
/// Installed as the router fallback so clients may connect to `/`,
/// `/ws`, or anything else on the port.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<TransportState>,
) -> impl IntoResponse {
    let id = state.ids.next_connection();
    let events = state.events.clone();
    let failed = state.events;

    ws.on_failed_upgrade(move |err| {
        let description = format!("upgrade failed: {err}");
        if failed.try_send(TransportEvent::Error(description)).is_err() {
            tracing::warn!(error = %err, "event queue full, dropping upgrade failure");
        }
    })
    .on_upgrade(move |socket| run_connection(socket, id, events))
}

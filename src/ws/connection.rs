//! Per-connection read/write task.
//!
//! Runs on the owning server's runtime. Forwards inbound text frames to the
//! control thread and writes whatever the control thread queues on the
//! connection's [`ConnectionHandle`](super::messages::ConnectionHandle).

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ConnectionHandle, Outbound, TransportEvent};
use crate::domain::ConnectionId;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reports `Opened` first, then one `Message` per text frame.
/// - Writes queued [`Outbound`] frames until a close is requested.
/// - Always reports `Closed` on exit, unless the control side is gone.
///
/// Reports wait for room in the bounded event queue, so a peer that sends
/// faster than the host polls is held back by TCP flow control instead of
/// being buffered in memory.
pub async fn run_connection(
    socket: WebSocket,
    id: ConnectionId,
    events: mpsc::Sender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut outbound_rx) = ConnectionHandle::channel();

    if events.send(TransportEvent::Opened { id, handle }).await.is_err() {
        return;
    }
    tracing::debug!(%id, "ws connection opened");

    loop {
        tokio::select! {
            biased;

            // Frame queued by the control thread; a requested close wins
            // over pending reads
            out = outbound_rx.recv() => {
                match out {
                    Some(Outbound::Text(text)) => {
                        if let Err(err) = ws_tx.send(Message::text(text)).await {
                            tracing::warn!(%id, error = %err, "ws write failed");
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let frame = CloseFrame {
                            code: close_code::NORMAL,
                            reason: Utf8Bytes::from_static(""),
                        };
                        if let Err(err) = ws_tx.send(Message::Close(Some(frame))).await {
                            tracing::warn!(%id, error = %err, "ws close failed");
                        }
                        break;
                    }
                    None => break,
                }
            }
            // Incoming frame from the peer
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.as_str().to_string();
                        if events.send(TransportEvent::Message { id, text }).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::debug!(%id, len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) => {
                        // Flush the close reply queued by the protocol layer
                        if let Err(err) = ws_tx.close().await {
                            tracing::debug!(%id, error = %err, "close reply not delivered");
                        }
                        break;
                    }
                    None => break,
                    Some(Err(err)) => {
                        tracing::warn!(%id, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed { id }).await;
    tracing::debug!(%id, "ws connection closed");
}

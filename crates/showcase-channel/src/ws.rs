//! `WebSocket` handlers.
//!
//! - `GET /ws` -- the echo channel. Pings are answered with a pong,
//!   broadcast frames are relayed verbatim to every other connection,
//!   other JSON is echoed back wrapped, and malformed frames get a typed
//!   error. The connection stays open in every case.
//! - `GET /ws/raw` -- echoes text and binary frames back unchanged.
//! - `GET /ws/presentation` -- streams a [`PlaybackSnapshot`] each time
//!   the presentation publishes one.
//!
//! [`PlaybackSnapshot`]: showcase_types::PlaybackSnapshot

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Serialize;
use showcase_types::{ConnectionId, PlaybackSnapshot, ServerMessage};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::protocol::{self, Response};
use crate::state::AppState;

/// Upgrade to the echo channel.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_echo(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_echo(socket, state))
}

/// Upgrade to the raw echo variant.
///
/// # Route
///
/// `GET /ws/raw`
pub async fn ws_raw(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_raw)
}

/// Upgrade to the playback snapshot stream.
///
/// # Route
///
/// `GET /ws/presentation`
pub async fn ws_presentation(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ChannelError> {
    let snapshots = state.presentation()?.subscribe();
    Ok(ws.on_upgrade(|socket| handle_presentation(socket, snapshots)))
}

/// Serialize `value` and send it as a text frame. Returns `false` once the
/// client is gone.
async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize outbound message: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_echo(mut socket: WebSocket, state: Arc<AppState>) {
    let id = ConnectionId::new();
    info!(connection = %id, "Echo client connected");

    let mut relay = state.subscribe_relay();

    loop {
        tokio::select! {
            // Broadcast frames from other connections.
            result = relay.recv() => {
                match result {
                    Ok(frame) if frame.from != id => {
                        if socket.send(Message::Text(frame.text.into())).await.is_err() {
                            debug!(connection = %id, "Echo client disconnected (send failed)");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        debug!(connection = %id, skipped = n, "Echo client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Relay channel closed, shutting down WebSocket");
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => {
                        String::from_utf8(data.to_vec()).unwrap_or_default()
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %id, "WebSocket error: {e}");
                        break;
                    }
                };

                debug!(connection = %id, len = text.len(), "Received frame");
                let delivered = match protocol::respond(&text) {
                    Response::Reply(reply) => send_json(&mut socket, &reply).await,
                    Response::Relay => {
                        let reached = state.relay(id, text);
                        debug!(connection = %id, reached, "Relayed broadcast frame");
                        true
                    }
                };
                if !delivered {
                    break;
                }
            }
        }
    }

    info!(connection = %id, "Echo client disconnected");
}

async fn handle_raw(mut socket: WebSocket) {
    debug!("Raw echo client connected");

    while let Some(msg) = socket.recv().await {
        let reply = match msg {
            Ok(Message::Text(text)) => Message::Text(text),
            Ok(Message::Binary(data)) => Message::Binary(data),
            Ok(Message::Ping(data)) => Message::Pong(data),
            Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!("WebSocket error: {e}");
                break;
            }
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }

    debug!("Raw echo client disconnected");
}

async fn handle_presentation(
    mut socket: WebSocket,
    mut snapshots: watch::Receiver<PlaybackSnapshot>,
) {
    debug!("Presentation stream client connected");

    let current = snapshots.borrow_and_update().clone();
    if !send_json(&mut socket, &current).await {
        return;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Presentation runner ended, closing stream");
                    let _ = send_json(&mut socket, &ServerMessage::Error {
                        message: "presentation ended".to_owned(),
                    })
                    .await;
                    return;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if !send_json(&mut socket, &snapshot).await {
                    debug!("Presentation stream client disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => {
                        debug!("Presentation stream client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    _ => {
                        // Client frames carry no meaning on this stream.
                    }
                }
            }
        }
    }
}

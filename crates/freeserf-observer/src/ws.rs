//! `WebSocket` handler for real-time tick summary streaming.
//!
//! Clients connect to `GET /ws` and receive a JSON-encoded
//! [`TickBroadcast`](crate::state::TickBroadcast) once per completed
//! game tick. All clients share one [`tokio::sync::broadcast`] channel,
//! so a slow client falls behind and skips ahead rather than stalling
//! the others.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming tick summaries.
pub async fn ws_ticks(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("observer websocket client connected");
    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(tick) => {
                        let json = match serde_json::to_string(&tick) {
                            Ok(json) => json,
                            Err(err) => {
                                warn!("failed to serialize tick broadcast: {err}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("observer websocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "observer websocket client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("tick broadcast channel closed, ending websocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("observer websocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("observer websocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        debug!("observer websocket error: {err}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

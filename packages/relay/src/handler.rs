//! WebSocket and HTTP endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use atelier_shared::protocol::{ClientFrame, ServerFrame};
use atelier_shared::types::{RoomId, UserIdentity};

use crate::sink::ChannelSink;
use crate::state::{AppState, ConnectQuery};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // A join without a room id or user id is rejected up front instead of
    // being silently ignored.
    let room_id = match RoomId::new(query.group_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("rejecting handshake: {e}");
            return Err(StatusCode::BAD_REQUEST);
        }
    };
    if query.user_id.trim().is_empty() {
        tracing::warn!(room = %room_id, "rejecting handshake: empty user id");
        return Err(StatusCode::BAD_REQUEST);
    }

    let identity = UserIdentity {
        user_id: atelier_shared::types::UserId::new(query.user_id),
        user_email: query.user_email,
        user_name: query.user_name,
        user_image: query.user_image,
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, identity)))
}

/// Forward frames queued by the registry to this connection's socket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: RoomId, identity: UserIdentity) {
    // Register only once the upgrade has completed: a connection dropped
    // mid-handshake never joins, so every join on this task has a matching
    // leave below.
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink::new(tx.clone()));
    let connection_id = {
        let mut registry = state.registry.lock().await;
        registry.join(&room_id, identity, sink).await
    };

    let (sender, mut receiver) = socket.split();

    let mut send_task = pusher_loop(rx, sender);

    let state_clone = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(%connection_id, "websocket error: {e}");
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    // Validate the envelope once on ingress; the payload
                    // itself is forwarded verbatim.
                    let frame = match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(%connection_id, "unparseable frame: {e}");
                            let error = ServerFrame::Error {
                                message: format!("unrecognized frame: {e}"),
                            };
                            if let Ok(json) = serde_json::to_string(&error) {
                                let _ = tx.send(json);
                            }
                            continue;
                        }
                    };

                    match frame {
                        ClientFrame::LeaveGame { group_id } => {
                            tracing::info!(%connection_id, room = %group_id, "explicit leave");
                            break;
                        }
                        relayed => {
                            let registry = state_clone.registry.lock().await;
                            registry
                                .relay(connection_id, relayed.room_id(), &text)
                                .await;
                        }
                    }
                }
                Message::Ping(_) => {
                    // Pong is handled by the protocol layer.
                }
                Message::Close(_) => {
                    tracing::info!(%connection_id, "client requested close");
                    break;
                }
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Transport disconnect and explicit leave end up here identically.
    let mut registry = state.registry.lock().await;
    registry.leave(connection_id).await;
    tracing::info!(%connection_id, room = %room_id, "connection closed");
}

/// Liveness probe: process status and current room count.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let rooms = state.registry.lock().await.room_count();
    Json(serde_json::json!({ "status": "ok", "rooms": rooms }))
}

//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    domain::{ConnectionId, Outbound, PusherChannel},
    infrastructure::dto::websocket::{ClientMessage, Heartbeat, ServerMessage},
    ui::state::AppState,
    usecase::{JoinError, JoinRequest},
};

/// Close code for a join without a usable canvas id (1008 policy violation)
const INVALID_ROOM_CLOSE_CODE: u16 = 1008;

/// Query parameters for WebSocket connection
///
/// Both are optional: without `canvasId` the socket waits for `join_canvas`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub canvas_id: Option<String>,
    pub user_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

/// Spawns a task that drains the outbound queue into the WebSocket sink.
///
/// A `Close` frame is written and ends the task.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if sender.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    })
}

/// Join (or switch to) a room; an unusable canvas id closes the socket.
///
/// Returns whether the connection is now in a room.
fn join(
    state: &AppState,
    connection_id: ConnectionId,
    tx: &PusherChannel,
    canvas_id: Option<String>,
    user_id: Option<String>,
) -> bool {
    let request = JoinRequest {
        connection_id,
        canvas_id,
        user_id,
        sender: tx.clone(),
    };
    match state.join_canvas_usecase.execute(request) {
        Ok(receipt) => {
            tracing::debug!(
                "Connection {} is in '{}' as '{}'",
                connection_id,
                receipt.canvas_id,
                receipt.user_id
            );
            true
        }
        Err(JoinError::InvalidRoom) => {
            tracing::warn!("Connection {} sent a join without a canvas id", connection_id);
            let _ = tx.send(Outbound::Close {
                code: INVALID_ROOM_CLOSE_CODE,
                reason: "invalid room".to_string(),
            });
            false
        }
    }
}

/// Handle one text frame. Returns `true` when it was a successful join.
fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    tx: &PusherChannel,
    default_user: &Option<String>,
    text: &str,
) -> bool {
    let decoded = match ClientMessage::decode(text) {
        Ok(Some(decoded)) => decoded,
        Ok(None) => {
            tracing::debug!("Ignoring unhandled message from {}", connection_id);
            return false;
        }
        Err(e) => {
            tracing::warn!("Dropping malformed message from {}: {}", connection_id, e);
            return false;
        }
    };

    match decoded.message {
        ClientMessage::JoinCanvas(data) => {
            let user_id = data.user_id.or_else(|| default_user.clone());
            return join(state, connection_id, tx, data.canvas_id, user_id);
        }
        ClientMessage::Ping(_) => {
            match ServerMessage::Pong(Heartbeat {}).encode(state.clock.now_millis()) {
                Ok(json) => {
                    let _ = tx.send(Outbound::Text(Arc::from(json)));
                }
                Err(e) => tracing::error!("Failed to encode pong: {}", e),
            }
        }
        ClientMessage::Pong(_) => {
            tracing::trace!("Pong from {}", connection_id);
        }
    }
    false
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, query: ConnectQuery) {
    let connection_id = ConnectionId::generate();
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    tracing::info!("Connection {} opened", connection_id);

    // Spawn a task to push queued frames to this client
    let mut send_task = pusher_loop(rx, sender);

    let joined = query.canvas_id.is_some()
        && join(
            &state,
            connection_id,
            &tx,
            query.canvas_id.clone(),
            query.user_id.clone(),
        );

    // The heartbeat only sees sockets that are in a room, so an unjoined
    // socket gets one heartbeat timeout to send a usable `join_canvas`.
    let mut join_deadline =
        (!joined).then(|| Instant::now() + state.heartbeat_monitor.config().timeout());

    let state_clone = state.clone();
    let default_user = query.user_id;

    // Spawn a task to receive messages from this client
    let mut recv_task = tokio::spawn(async move {
        loop {
            let next = match join_deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, receiver.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::info!(
                            "Connection {} never joined a canvas, closing",
                            connection_id
                        );
                        let _ = tx.send(Outbound::Close {
                            code: INVALID_ROOM_CLOSE_CODE,
                            reason: "join timeout".to_string(),
                        });
                        // The pusher ends after writing the close frame
                        join_deadline = None;
                        continue;
                    }
                },
                None => receiver.next().await,
            };
            let Some(msg) = next else {
                break;
            };
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            };

            // Any inbound frame counts as a liveness signal
            state_clone.heartbeat_monitor.record_activity(&connection_id);

            match msg {
                Message::Text(text) => {
                    let joined =
                        dispatch(&state_clone, connection_id, &tx, &default_user, text.as_str());
                    if joined {
                        join_deadline = None;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Connection {} requested close", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.leave_canvas_usecase.execute(&connection_id);
    tracing::info!("Connection {} closed", connection_id);
}

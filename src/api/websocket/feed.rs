//! Live data feed WebSocket handler
//!
//! Each connection is registered as a listener with the broadcast hub. The
//! first frame is the `initialData` snapshot, followed by one `newData` frame
//! per ingested entry.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use crate::api::server::AppState;

/// WebSocket handler for the live feed
pub async fn feed_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_feed_ws(socket, state))
}

async fn handle_feed_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = state.relay.connect();
    let listener_id = subscription.id;

    info!(listener = %listener_id, "New client connected");

    // Forward pushed events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize {} event: {}", event.name(), e);
                }
            }
        }
    });

    // Watch for close; client messages are otherwise ignored
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Feed WebSocket received close");
                    break;
                }
                Err(e) => {
                    debug!("Feed WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut receive_task => {}
    }

    state.relay.disconnect(listener_id);
    send_task.abort();
    receive_task.abort();
    let _ = tokio::join!(send_task, receive_task);

    info!(listener = %listener_id, "Client disconnected");
}

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::hub::{is_valid_channel_name, BroadcastHub, ConnectionHandle};
use crate::metrics::{WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_MESSAGES_RECEIVED};
use crate::server::AppState;

use super::message::ClientRequest;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    // Channel for events fanned out to this connection
    let (tx, mut rx) = mpsc::channel::<Event>(state.settings.hub.channel_buffer);

    let handle = state.hub.register(tx);
    let connection_id = handle.id;
    WS_CONNECTIONS_OPENED.inc();

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task pumping events from the hub to the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Task parsing inbound client requests
    let hub = state.hub.clone();
    let handle_clone = handle.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_frame(msg, &hub, &handle_clone) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %handle_clone.id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Either task ending means the connection is done
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // The transport's disconnect signal: exactly once per connection lifetime
    state.hub.on_disconnect(connection_id);
    WS_CONNECTIONS_CLOSED.inc();

    tracing::info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Process one received frame. Returns false when the connection should close.
fn process_frame(msg: Message, hub: &BroadcastHub, handle: &Arc<ConnectionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            WS_MESSAGES_RECEIVED.inc();

            let request: ClientRequest = match serde_json::from_str(&text) {
                Ok(r) => r,
                Err(e) => {
                    // Malformed request: error event to this connection only
                    tracing::warn!(connection_id = %handle.id, error = %e, "Failed to parse client request");
                    let _ = handle.try_send(Event::error("INVALID_REQUEST", e.to_string()));
                    return true;
                }
            };

            handle_request(request, hub, handle);
            true
        }
        Message::Binary(_) => {
            let _ = handle.try_send(Event::error(
                "UNSUPPORTED_FORMAT",
                "binary frames are not supported",
            ));
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}

fn handle_request(request: ClientRequest, hub: &BroadcastHub, handle: &Arc<ConnectionHandle>) {
    match request {
        ClientRequest::Subscribe { channels } => {
            let (valid, invalid): (Vec<String>, Vec<String>) = channels
                .into_iter()
                .partition(|c| is_valid_channel_name(c));

            if !invalid.is_empty() {
                let _ = handle.try_send(Event::error(
                    "INVALID_CHANNEL",
                    format!("invalid channel names: {}", invalid.join(", ")),
                ));
            }
            if !valid.is_empty() {
                hub.subscribe(handle.id, &valid);
            }
        }
        ClientRequest::Unsubscribe { channels } => {
            hub.unsubscribe(handle.id, &channels);
        }
    }
}

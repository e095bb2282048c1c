use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::gateway::ConnectionGateway;

/// Time the writer gets to flush queued events and the Close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection gets a session from the gateway and is
/// driven by two tasks (writer + reader).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let ping_interval = state.config.ws_ping_interval;
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway, ping_interval))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Connects a session through the gateway.
///   2. Spawns a writer task that serializes session events and pings.
///   3. Dispatches inbound frames to the session on the current task.
///   4. Disconnects the session when the stream ends or the server shuts down.
async fn handle_socket(socket: WebSocket, gateway: ConnectionGateway, ping_interval: Duration) {
    let (mut session, mut rx) = gateway.connect().await;
    let session_id = session.id().to_string();

    let (mut sink, mut stream) = socket.split();

    // Writer task: forward session events to the WebSocket sink.
    let writer_session_id = session_id.clone();
    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // First tick completes immediately.
        ping.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(
                                session_id = %writer_session_id,
                                event_type = event.event_type(),
                                error = %e,
                                "Failed to serialize event",
                            );
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        tracing::debug!(session_id = %writer_session_id, "WebSocket sink closed");
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        tracing::debug!(session_id = %writer_session_id, "WebSocket sink closed");
                        break;
                    }
                }
            }
        }
    });

    // Reader loop: dispatch inbound commands.
    loop {
        let result = tokio::select! {
            biased;
            _ = gateway.shutdown_requested() => {
                tracing::debug!(session_id = %session_id, "Closing session for shutdown");
                break;
            }
            frame = stream.next() => match frame {
                Some(result) => result,
                None => break,
            },
        };

        match result {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => session.handle_text(text).await,
                Err(_) => {
                    tracing::debug!(session_id = %session_id, len = data.len(), "Ignoring non-UTF-8 binary frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: release the session and cancel its producers. The channel
    // then closes and the writer sends a Close frame before exiting.
    gateway.disconnect(&mut session).await;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

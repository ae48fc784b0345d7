use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /ws -- upgrade to the push channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager))
}

/// Register the connection, forward outbound messages from the manager on a
/// spawned task and answer client messages on this one.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                if let Some(reply) = reply_to(text.as_str()) {
                    ws_manager
                        .send_to(&conn_id, Message::Text(reply.to_string().into()))
                        .await;
                }
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Response to a client message, if it warrants one.
fn reply_to(text: &str) -> Option<Value> {
    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring non-JSON WebSocket message");
            return None;
        }
    };

    match message.get("type").and_then(Value::as_str) {
        Some("ping") => Some(json!({
            "type": "pong",
            "timestamp": chrono::Utc::now().timestamp_millis(),
        })),
        other => {
            tracing::debug!(message_type = ?other, "Unhandled WebSocket message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_gets_pong_with_timestamp() {
        let reply = reply_to(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(reply["type"], "pong");
        assert!(reply["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn other_messages_get_no_reply() {
        assert!(reply_to(r#"{"type":"subscribe"}"#).is_none());
        assert!(reply_to("not json").is_none());
    }
}

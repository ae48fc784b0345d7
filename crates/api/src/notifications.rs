//! Forwards update-bus events to every push connection.

use std::sync::Arc;

use clipcraftr_events::UpdateEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Relays each [`UpdateEvent`] to all WebSocket clients in its wire form.
pub struct UpdateBridge {
    ws_manager: Arc<WsManager>,
}

impl UpdateBridge {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the bus is dropped.
    ///
    /// A lagging receiver skips the missed events; clients resynchronise
    /// from the queue snapshot carried by the next queue update.
    pub async fn run(self, mut receiver: broadcast::Receiver<UpdateEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let reached = self.ws_manager.broadcast_json(&event.to_message()).await;
                    tracing::trace!(
                        channel = %event.channel,
                        kind = %event.kind,
                        reached,
                        "Update forwarded",
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Update bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, update bridge shutting down");
                    break;
                }
            }
        }
    }
}

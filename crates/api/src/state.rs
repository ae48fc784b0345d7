use std::sync::Arc;

use clipcraftr_db::store::SharedStore;
use clipcraftr_events::EventBus;
use clipcraftr_pipeline::{QueueService, SubmissionService};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Document store, also used directly by the health check.
    pub store: SharedStore,
    pub queue: Arc<QueueService>,
    pub submissions: Arc<SubmissionService>,
    /// Push connections.
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
}

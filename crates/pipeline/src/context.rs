use std::sync::Arc;

use clipcraftr_db::store::SharedStore;
use clipcraftr_events::{AuditRecord, AuditTrail, EventBus};
use serde_json::Value;

/// Handles every pipeline component needs: the store, the update bus and
/// the audit trail. Cheap to clone.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: SharedStore,
    pub bus: Arc<EventBus>,
    pub audit: AuditTrail,
}

impl PipelineContext {
    pub fn new(store: SharedStore, bus: Arc<EventBus>, audit: AuditTrail) -> Self {
        Self { store, bus, audit }
    }

    pub fn emit(&self, channel: &str, kind: &str, data: Value) {
        self.bus.emit(channel, kind, data);
    }

    pub fn record(&self, record: AuditRecord) {
        self.audit.record(record);
    }
}

//! Append-only audit trail.
//!
//! [`AuditTrail::record`] never blocks and never fails from the caller's
//! point of view: records go into an unbounded channel drained by
//! [`AuditWriter::run`], which persists them through the store and logs
//! any write failure.

use clipcraftr_db::models::audit::CreateAuditLog;
use clipcraftr_db::store::{AuditStore, SharedStore};
use tokio::sync::mpsc;

/// One audited action.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Acting user, or [`SYSTEM_ACTOR`](clipcraftr_core::audit::SYSTEM_ACTOR).
    pub user: Option<String>,
    pub action: String,
    pub collection: String,
    pub document_id: Option<String>,
    pub details: serde_json::Value,
}

impl AuditRecord {
    pub fn new(action: &str, collection: &str) -> Self {
        Self {
            user: None,
            action: action.to_string(),
            collection: collection.to_string(),
            document_id: None,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn by(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn document(mut self, id: impl ToString) -> Self {
        self.document_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    fn into_row(self) -> CreateAuditLog {
        CreateAuditLog {
            user_id: self.user,
            action: self.action,
            collection: self.collection,
            document_id: self.document_id,
            details: self.details,
        }
    }
}

/// Cloneable sending half of the audit channel.
#[derive(Clone)]
pub struct AuditTrail {
    sender: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditTrail {
    /// Create the trail and the receiver to hand to [`AuditWriter::run`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuditRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            action = %record.action,
            collection = %record.collection,
            document_id = record.document_id.as_deref().unwrap_or(""),
            user = record.user.as_deref().unwrap_or(""),
            "Audit"
        );
        if self.sender.send(record).is_err() {
            tracing::warn!("Audit writer stopped, record dropped");
        }
    }
}

/// Background task persisting audit records.
pub struct AuditWriter;

impl AuditWriter {
    /// Drain `receiver` until every [`AuditTrail`] handle is dropped.
    pub async fn run(store: SharedStore, mut receiver: mpsc::UnboundedReceiver<AuditRecord>) {
        while let Some(record) = receiver.recv().await {
            let action = record.action.clone();
            if let Err(e) = store.insert_audit_log(&record.into_row()).await {
                tracing::error!(error = %e, action = %action, "Failed to persist audit record");
            }
        }
        tracing::info!("Audit trail closed, writer shutting down");
    }
}

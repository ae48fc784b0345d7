//! Audit log rows.

use clipcraftr_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the append-only `audit_logs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: DbId,
    pub timestamp: Timestamp,
    pub user_id: Option<String>,
    pub action: String,
    pub collection: String,
    pub document_id: Option<String>,
    pub details: serde_json::Value,
}

/// Insert DTO for an audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAuditLog {
    pub user_id: Option<String>,
    pub action: String,
    pub collection: String,
    pub document_id: Option<String>,
    pub details: serde_json::Value,
}

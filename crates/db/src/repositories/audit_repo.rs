//! Repository for the append-only `audit_logs` table.

use sqlx::PgPool;

use crate::models::audit::{AuditLog, CreateAuditLog};

/// Column list for `audit_logs` SELECT queries.
const COLUMNS: &str = "id, timestamp, user_id, action, collection, document_id, details";

pub struct AuditLogRepo;

impl AuditLogRepo {
    pub async fn insert(pool: &PgPool, entry: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_logs (user_id, action, collection, document_id, details) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(&entry.user_id)
            .bind(&entry.action)
            .bind(&entry.collection)
            .bind(&entry.document_id)
            .bind(&entry.details)
            .fetch_one(pool)
            .await
    }

    /// Most recent entries first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

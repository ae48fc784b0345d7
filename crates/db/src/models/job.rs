//! Job rows and DTOs.

use clipcraftr_core::status::JobStatus;
use clipcraftr_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub priority: i32,
    pub user_id: Option<String>,
    pub guild_id: Option<String>,
    pub attempts: i32,
    pub deadline_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for a new pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub user_id: Option<String>,
    pub guild_id: Option<String>,
}

/// Filter for queue listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    /// `None` means unbounded.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl JobFilter {
    /// Whether a job passes the user and type filters (paging aside).
    pub fn matches(&self, job: &Job) -> bool {
        self.user_id
            .as_deref()
            .is_none_or(|user| job.user_id.as_deref() == Some(user))
            && self
                .job_type
                .as_deref()
                .is_none_or(|job_type| job.job_type == job_type)
    }
}

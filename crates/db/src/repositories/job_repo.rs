//! Repository for the `jobs` table.
//!
//! Every status change is a single conditional UPDATE guarded by the
//! expected current status, so a concurrent writer can never move a job
//! backwards or out of a terminal state.

use clipcraftr_core::scheduling::QUEUE_ORDER_SQL;
use clipcraftr_core::status::JobStatus;
use clipcraftr_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{Job, JobFilter, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, payload, status, result, priority, user_id, guild_id, \
    attempts, deadline_at, created_at, updated_at";

/// Provides queue operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_type, payload, status, priority, user_id, guild_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.job_type)
            .bind(&input.payload)
            .bind(JobStatus::Pending.as_str())
            .bind(input.priority)
            .bind(&input.user_id)
            .bind(&input.guild_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Pending and processing jobs in queue order, filtered and paged.
    pub async fn list_active(pool: &PgPool, filter: &JobFilter) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status IN ($1, $2) \
               AND ($3::TEXT IS NULL OR user_id = $3) \
               AND ($4::TEXT IS NULL OR job_type = $4) \
             ORDER BY {QUEUE_ORDER_SQL} \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Processing.as_str())
            .bind(&filter.user_id)
            .bind(&filter.job_type)
            .bind(filter.limit)
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(pool)
            .await
    }

    /// Non-terminal jobs of one type, oldest first.
    pub async fn list_recoverable(pool: &PgPool, job_type: &str) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE job_type = $1 AND status IN ($2, $3) \
             ORDER BY {QUEUE_ORDER_SQL}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_type)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Processing.as_str())
            .fetch_all(pool)
            .await
    }

    /// `pending -> processing`. Sets the processing deadline and bumps
    /// `attempts`. Returns `None` when the job is absent or not pending.
    pub async fn mark_processing(
        pool: &PgPool,
        id: DbId,
        deadline: Timestamp,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, deadline_at = $3, attempts = attempts + 1 \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Processing.as_str())
            .bind(deadline)
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `processing -> completed` with the result payload.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result: &serde_json::Value,
    ) -> Result<Option<Job>, sqlx::Error> {
        Self::finish(pool, id, JobStatus::Completed, result).await
    }

    /// `processing -> failed` with `{error}` as the result.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<Option<Job>, sqlx::Error> {
        let result = serde_json::json!({ "error": error });
        Self::finish(pool, id, JobStatus::Failed, &result).await
    }

    async fn finish(
        pool: &PgPool,
        id: DbId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, result = $3, deadline_at = NULL \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(result)
            .bind(JobStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `processing -> pending`, used only by recovery and the sweeper.
    pub async fn reset_to_pending(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, deadline_at = NULL \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .bind(JobStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Processing jobs whose deadline passed before `now`.
    pub async fn list_expired(pool: &PgPool, now: Timestamp) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status = $1 AND deadline_at < $2 \
             ORDER BY deadline_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Processing.as_str())
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Delete a job only while it is still pending.
    pub async fn delete_pending(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "DELETE FROM jobs WHERE id = $1 AND status = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }
}

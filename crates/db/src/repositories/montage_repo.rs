//! Repository for the `montages` table.
//!
//! Status timestamps use `COALESCE` so each is written once, the first
//! time the montage reaches that status.

use clipcraftr_core::media::ProcessingStep;
use clipcraftr_core::status::MontageStatus;
use clipcraftr_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::montage::{Montage, MontageFilter, MontageOutput, NewMontage};

/// Column list for `montages` queries.
const COLUMNS: &str = "\
    id, user_id, title, description, clips, settings, status, priority, \
    processing_steps, current_step, progress, output_path, duration, file_size, \
    error, queued_at, started_at, completed_at, failed_at, cancelled_at, \
    created_at, updated_at";

/// Provides CRUD and status transitions for montages.
pub struct MontageRepo;

impl MontageRepo {
    pub async fn create(pool: &PgPool, input: &NewMontage) -> Result<Montage, sqlx::Error> {
        let query = format!(
            "INSERT INTO montages (user_id, title, description, clips, settings, status, priority, duration) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(input.user_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(Json(&input.clips))
            .bind(Json(&input.settings))
            .bind(MontageStatus::Queued.as_str())
            .bind(input.priority)
            .bind(input.duration)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM montages WHERE id = $1");
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Montages matching `filter`, newest first.
    pub async fn list(pool: &PgPool, filter: &MontageFilter) -> Result<Vec<Montage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM montages \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
               AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.limit)
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(pool)
            .await
    }

    /// `queued|processing -> processing`. Restarting a reclaimed render
    /// clears its steps and progress.
    pub async fn start(pool: &PgPool, id: DbId) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!(
            "UPDATE montages \
             SET status = $2, processing_steps = '[]'::jsonb, current_step = NULL, \
                 progress = 0, error = NULL, started_at = COALESCE(started_at, NOW()) \
             WHERE id = $1 AND status IN ($3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .bind(MontageStatus::Processing.as_str())
            .bind(MontageStatus::Queued.as_str())
            .bind(MontageStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Persist the step list and progress of a processing montage.
    pub async fn record_progress(
        pool: &PgPool,
        id: DbId,
        steps: &[ProcessingStep],
        current_step: Option<&str>,
        progress: i32,
    ) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!(
            "UPDATE montages \
             SET processing_steps = $2, current_step = $3, progress = LEAST($4, 99) \
             WHERE id = $1 AND status = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .bind(Json(steps))
            .bind(current_step)
            .bind(progress)
            .bind(MontageStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `processing -> completed` with the render output. Progress becomes 100.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        output: &MontageOutput,
    ) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!(
            "UPDATE montages \
             SET status = $2, progress = 100, output_path = $3, duration = $4, \
                 file_size = $5, current_step = NULL, error = NULL, \
                 completed_at = COALESCE(completed_at, NOW()) \
             WHERE id = $1 AND status = $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .bind(MontageStatus::Completed.as_str())
            .bind(&output.output_path)
            .bind(output.duration)
            .bind(output.file_size)
            .bind(MontageStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `queued|processing -> failed`.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!(
            "UPDATE montages \
             SET status = $2, error = $3, failed_at = COALESCE(failed_at, NOW()) \
             WHERE id = $1 AND status IN ($4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .bind(MontageStatus::Failed.as_str())
            .bind(error)
            .bind(MontageStatus::Queued.as_str())
            .bind(MontageStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `queued|processing -> cancelled`.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<Montage>, sqlx::Error> {
        let query = format!(
            "UPDATE montages \
             SET status = $2, cancelled_at = COALESCE(cancelled_at, NOW()) \
             WHERE id = $1 AND status IN ($3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Montage>(&query)
            .bind(id)
            .bind(MontageStatus::Cancelled.as_str())
            .bind(MontageStatus::Queued.as_str())
            .bind(MontageStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }
}

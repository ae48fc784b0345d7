//! Repository for the `clips` table.

use clipcraftr_core::error::CoreError;
use clipcraftr_core::media::ClipMetadata;
use clipcraftr_core::status::ClipStatus;
use clipcraftr_core::types::DbId;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::clip::{Clip, ClipFilter, NewClip};

/// Column list for `clips` queries.
const COLUMNS: &str = "\
    id, user_id, guild_id, channel_id, message_id, original_name, file_name, \
    file_url, file_path, file_size, duration, mime_type, metadata, status, \
    error, priority, tags, used_in_montages, is_public, content_hash, \
    uploaded_at, processed_at, deleted_at, created_at, updated_at";

/// Provides CRUD and status transitions for clips.
pub struct ClipRepo;

impl ClipRepo {
    /// Insert a clip after the per-user checks, all inside one transaction
    /// serialized on the owner by an advisory lock:
    ///
    /// 1. clips in `uploading`/`processing` must be below `queue_limit`
    /// 2. no live clip of the same owner may share the content hash
    ///
    /// Either check failing yields [`StoreError::Rejected`] with a conflict.
    pub async fn create_checked(
        pool: &PgPool,
        input: &NewClip,
        queue_limit: i32,
    ) -> Result<Clip, StoreError> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(input.user_id)
            .execute(&mut *tx)
            .await?;

        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clips WHERE user_id = $1 AND status IN ($2, $3)",
        )
        .bind(input.user_id)
        .bind(ClipStatus::Uploading.as_str())
        .bind(ClipStatus::Processing.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if active >= i64::from(queue_limit) {
            return Err(CoreError::Conflict(format!(
                "Queue limit reached: {active} of {queue_limit} clips are still being processed"
            ))
            .into());
        }

        if let Some(hash) = &input.content_hash {
            let (duplicate,): (bool,) = sqlx::query_as(
                "SELECT EXISTS( \
                     SELECT 1 FROM clips \
                     WHERE user_id = $1 AND content_hash = $2 AND status <> $3)",
            )
            .bind(input.user_id)
            .bind(hash)
            .bind(ClipStatus::Deleted.as_str())
            .fetch_one(&mut *tx)
            .await?;

            if duplicate {
                return Err(
                    CoreError::Conflict("This clip has already been submitted".to_string()).into(),
                );
            }
        }

        let query = format!(
            "INSERT INTO clips \
                 (user_id, guild_id, channel_id, message_id, original_name, file_name, \
                  file_url, file_path, file_size, duration, mime_type, metadata, status, \
                  priority, tags, content_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {COLUMNS}"
        );
        let clip = sqlx::query_as::<_, Clip>(&query)
            .bind(input.user_id)
            .bind(&input.guild_id)
            .bind(&input.channel_id)
            .bind(&input.message_id)
            .bind(&input.original_name)
            .bind(&input.file_name)
            .bind(&input.file_url)
            .bind(&input.file_path)
            .bind(input.file_size)
            .bind(input.duration)
            .bind(&input.mime_type)
            .bind(sqlx::types::Json(&input.metadata))
            .bind(ClipStatus::Uploading.as_str())
            .bind(input.priority)
            .bind(&input.tags)
            .bind(&input.content_hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(clip)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Clip>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clips WHERE id = $1");
        sqlx::query_as::<_, Clip>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Clip>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clips WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, Clip>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Clips matching `filter`, newest first. Without a status filter,
    /// deleted clips are excluded.
    pub async fn list(pool: &PgPool, filter: &ClipFilter) -> Result<Vec<Clip>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM clips \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
               AND (($2::TEXT IS NULL AND status <> $3) OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(ClipStatus::Deleted.as_str())
            .bind(filter.limit)
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(pool)
            .await
    }

    /// Clips still counting against the owner's queue limit.
    pub async fn count_active(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clips WHERE user_id = $1 AND status IN ($2, $3)",
        )
        .bind(user_id)
        .bind(ClipStatus::Uploading.as_str())
        .bind(ClipStatus::Processing.as_str())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// `uploading|processing -> processing`, clearing any previous error.
    pub async fn start_processing(pool: &PgPool, id: DbId) -> Result<Option<Clip>, sqlx::Error> {
        let query = format!(
            "UPDATE clips SET status = $2, error = NULL \
             WHERE id = $1 AND status IN ($3, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(id)
            .bind(ClipStatus::Processing.as_str())
            .bind(ClipStatus::Uploading.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `processing -> ready` with refreshed metadata.
    pub async fn mark_ready(
        pool: &PgPool,
        id: DbId,
        metadata: &ClipMetadata,
    ) -> Result<Option<Clip>, sqlx::Error> {
        let query = format!(
            "UPDATE clips SET status = $2, metadata = $3, processed_at = NOW(), error = NULL \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(id)
            .bind(ClipStatus::Ready.as_str())
            .bind(sqlx::types::Json(metadata))
            .bind(ClipStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// `uploading|processing -> error` with the failure message.
    pub async fn mark_error(
        pool: &PgPool,
        id: DbId,
        error: &str,
    ) -> Result<Option<Clip>, sqlx::Error> {
        let query = format!(
            "UPDATE clips SET status = $2, error = $3 \
             WHERE id = $1 AND status IN ($4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(id)
            .bind(ClipStatus::Error.as_str())
            .bind(error)
            .bind(ClipStatus::Uploading.as_str())
            .bind(ClipStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Soft delete. Returns `None` if absent or already deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<Option<Clip>, sqlx::Error> {
        let query = format!(
            "UPDATE clips SET status = $2, deleted_at = NOW() \
             WHERE id = $1 AND status <> $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Clip>(&query)
            .bind(id)
            .bind(ClipStatus::Deleted.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Record that `montage_id` uses each of `clip_ids`.
    pub async fn add_montage_ref(
        pool: &PgPool,
        clip_ids: &[DbId],
        montage_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE clips SET used_in_montages = array_append(used_in_montages, $2) \
             WHERE id = ANY($1) AND NOT ($2 = ANY(used_in_montages))",
        )
        .bind(clip_ids)
        .bind(montage_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

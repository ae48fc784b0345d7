//! Repository for the `users` table.

use clipcraftr_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{UpsertUser, User, UserLimits};

/// Column list for `users` queries.
const COLUMNS: &str = "\
    id, discord_id, username, discriminator, avatar, is_admin, queue_limit, \
    max_clip_duration, max_montage_duration, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Find-or-create keyed by `discord_id`, refreshing the profile fields.
    pub async fn upsert(pool: &PgPool, input: &UpsertUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (discord_id, username, discriminator, avatar) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (discord_id) DO UPDATE \
             SET username = EXCLUDED.username, \
                 discriminator = EXCLUDED.discriminator, \
                 avatar = EXCLUDED.avatar \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.discord_id)
            .bind(&input.username)
            .bind(&input.discriminator)
            .bind(&input.avatar)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_discord_id(
        pool: &PgPool,
        discord_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE discord_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(discord_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_limits(
        pool: &PgPool,
        id: DbId,
        limits: &UserLimits,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "UPDATE users \
             SET queue_limit = $2, max_clip_duration = $3, max_montage_duration = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(limits.queue_limit)
            .bind(limits.max_clip_duration)
            .bind(limits.max_montage_duration)
            .fetch_optional(pool)
            .await
    }
}

//! User rows and DTOs.

use clipcraftr_core::limits::{
    DEFAULT_MAX_CLIP_DURATION, DEFAULT_MAX_MONTAGE_DURATION, DEFAULT_QUEUE_LIMIT,
};
use clipcraftr_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DbId,
    pub discord_id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub queue_limit: i32,
    pub max_clip_duration: i32,
    pub max_montage_duration: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Find-or-create DTO keyed by `discord_id`. Profile fields are refreshed
/// on every call; limits keep their stored values.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUser {
    pub discord_id: String,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_discriminator() -> String {
    "0".to_string()
}

/// Admin-adjustable per-user limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimits {
    pub queue_limit: i32,
    pub max_clip_duration: i32,
    pub max_montage_duration: i32,
}

impl Default for UserLimits {
    fn default() -> Self {
        Self {
            queue_limit: DEFAULT_QUEUE_LIMIT,
            max_clip_duration: DEFAULT_MAX_CLIP_DURATION,
            max_montage_duration: DEFAULT_MAX_MONTAGE_DURATION,
        }
    }
}

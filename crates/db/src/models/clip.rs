//! Clip rows and DTOs.

use clipcraftr_core::media::{format_minutes, ClipMetadata};
use clipcraftr_core::status::ClipStatus;
use clipcraftr_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `clips` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: DbId,
    pub user_id: DbId,
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub original_name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_path: String,
    pub file_size: i64,
    /// Seconds.
    pub duration: f64,
    pub mime_type: String,
    #[sqlx(json)]
    pub metadata: ClipMetadata,
    #[sqlx(try_from = "String")]
    pub status: ClipStatus,
    pub error: Option<String>,
    pub priority: i32,
    pub tags: Vec<String>,
    pub used_in_montages: Vec<DbId>,
    pub is_public: bool,
    #[serde(skip)]
    pub content_hash: Option<String>,
    pub uploaded_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Clip {
    /// Duration as `M:SS`.
    pub fn formatted_duration(&self) -> String {
        format_minutes(self.duration)
    }
}

/// Filter for clip listings. Without a status, deleted clips are left out.
#[derive(Debug, Clone, Default)]
pub struct ClipFilter {
    pub user_id: Option<DbId>,
    pub status: Option<ClipStatus>,
    /// `None` means unbounded.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ClipFilter {
    /// Whether a clip passes the owner and status filters (paging aside).
    pub fn matches(&self, clip: &Clip) -> bool {
        self.user_id.is_none_or(|user| clip.user_id == user)
            && match self.status {
                Some(status) => clip.status == status,
                None => clip.status != ClipStatus::Deleted,
            }
    }
}

/// Insert DTO for a freshly downloaded and probed clip.
#[derive(Debug, Clone)]
pub struct NewClip {
    pub user_id: DbId,
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub original_name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_path: String,
    pub file_size: i64,
    pub duration: f64,
    pub mime_type: String,
    pub metadata: ClipMetadata,
    pub priority: i32,
    pub tags: Vec<String>,
    pub content_hash: Option<String>,
}

/// Lowercase, trim and de-duplicate tags, dropping empty ones.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

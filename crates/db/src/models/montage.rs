//! Montage rows and DTOs.

use clipcraftr_core::media::{format_hours, MontageClip, MontageSettings, ProcessingStep};
use clipcraftr_core::status::MontageStatus;
use clipcraftr_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `montages` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Montage {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub clips: Vec<MontageClip>,
    #[sqlx(json)]
    pub settings: MontageSettings,
    #[sqlx(try_from = "String")]
    pub status: MontageStatus,
    pub priority: i32,
    #[sqlx(json)]
    pub processing_steps: Vec<ProcessingStep>,
    pub current_step: Option<String>,
    /// 0-100. Reaches 100 only on completion.
    pub progress: i32,
    pub output_path: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub file_size: Option<i64>,
    pub error: Option<String>,
    pub queued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Montage {
    /// Duration as `H:MM:SS`, or `M:SS` under an hour.
    pub fn formatted_duration(&self) -> String {
        format_hours(self.duration)
    }

    /// Clip references sorted by their `order` field.
    pub fn ordered_clips(&self) -> Vec<MontageClip> {
        let mut clips = self.clips.clone();
        clips.sort_by_key(|c| c.order);
        clips
    }
}

/// Filter for montage listings.
#[derive(Debug, Clone, Default)]
pub struct MontageFilter {
    pub user_id: Option<DbId>,
    pub status: Option<MontageStatus>,
    /// `None` means unbounded.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl MontageFilter {
    pub fn matches(&self, montage: &Montage) -> bool {
        self.user_id.is_none_or(|user| montage.user_id == user)
            && self.status.is_none_or(|status| montage.status == status)
    }
}

/// Insert DTO for a new queued montage.
#[derive(Debug, Clone)]
pub struct NewMontage {
    pub user_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub clips: Vec<MontageClip>,
    pub settings: MontageSettings,
    pub priority: i32,
    /// Expected output length in seconds (sum of trimmed clip durations).
    pub duration: f64,
}

/// What a successful render produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MontageOutput {
    pub output_path: String,
    pub duration: f64,
    pub file_size: Option<i64>,
}

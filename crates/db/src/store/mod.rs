//! Storage seam used by the pipeline and the API.
//!
//! [`PgStore`] delegates to the repositories; [`MemoryStore`] keeps every
//! table behind one lock and backs the test suites and `STORE_BACKEND=memory`.
//! Both honor the same conditional-transition contract: a transition whose
//! precondition does not hold returns `Ok(None)` and changes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use clipcraftr_core::media::{ClipMetadata, ProcessingStep};
use clipcraftr_core::types::{DbId, Timestamp};

use crate::error::StoreError;
use crate::models::audit::{AuditLog, CreateAuditLog};
use crate::models::clip::{Clip, ClipFilter, NewClip};
use crate::models::job::{Job, JobFilter, NewJob};
use crate::models::montage::{Montage, MontageFilter, MontageOutput, NewMontage};
use crate::models::user::{UpsertUser, User, UserLimits};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &NewJob) -> StoreResult<Job>;

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>>;

    /// Pending and processing jobs ordered by priority desc, age asc, id asc.
    async fn list_active_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>>;

    /// Non-terminal jobs of one type, in queue order.
    async fn list_recoverable_jobs(&self, job_type: &str) -> StoreResult<Vec<Job>>;

    /// `pending -> processing`, setting the deadline and bumping attempts.
    async fn mark_processing(&self, id: DbId, deadline: Timestamp) -> StoreResult<Option<Job>>;

    /// `processing -> completed`.
    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<Option<Job>>;

    /// `processing -> failed` with `{error}` as the result.
    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<Option<Job>>;

    /// `processing -> pending`. Reserved for recovery and the sweeper.
    async fn reset_to_pending(&self, id: DbId) -> StoreResult<Option<Job>>;

    /// Processing jobs whose deadline is before `now`.
    async fn list_expired_jobs(&self, now: Timestamp) -> StoreResult<Vec<Job>>;

    /// Delete a job only while it is pending.
    async fn delete_pending_job(&self, id: DbId) -> StoreResult<Option<Job>>;
}

#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Insert after the queue-limit and duplicate checks, serialized per owner.
    async fn insert_clip_checked(&self, clip: &NewClip, queue_limit: i32) -> StoreResult<Clip>;

    async fn find_clip(&self, id: DbId) -> StoreResult<Option<Clip>>;

    async fn find_clips(&self, ids: &[DbId]) -> StoreResult<Vec<Clip>>;

    /// Clips matching `filter`, newest first.
    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<Vec<Clip>>;

    async fn count_active_clips(&self, user_id: DbId) -> StoreResult<i64>;

    /// `uploading|processing -> processing`.
    async fn start_clip_processing(&self, id: DbId) -> StoreResult<Option<Clip>>;

    /// `processing -> ready`.
    async fn mark_clip_ready(&self, id: DbId, metadata: &ClipMetadata) -> StoreResult<Option<Clip>>;

    /// `uploading|processing -> error`.
    async fn mark_clip_error(&self, id: DbId, error: &str) -> StoreResult<Option<Clip>>;

    async fn soft_delete_clip(&self, id: DbId) -> StoreResult<Option<Clip>>;

    async fn add_montage_ref(&self, clip_ids: &[DbId], montage_id: DbId) -> StoreResult<()>;
}

#[async_trait]
pub trait MontageStore: Send + Sync {
    async fn insert_montage(&self, montage: &NewMontage) -> StoreResult<Montage>;

    async fn find_montage(&self, id: DbId) -> StoreResult<Option<Montage>>;

    /// Montages matching `filter`, newest first.
    async fn list_montages(&self, filter: &MontageFilter) -> StoreResult<Vec<Montage>>;

    /// `queued|processing -> processing`, clearing steps and progress.
    async fn start_montage(&self, id: DbId) -> StoreResult<Option<Montage>>;

    /// Steps and progress of a processing montage. Progress is capped at 99.
    async fn record_montage_progress(
        &self,
        id: DbId,
        steps: &[ProcessingStep],
        current_step: Option<&str>,
        progress: i32,
    ) -> StoreResult<Option<Montage>>;

    /// `processing -> completed`, progress 100.
    async fn complete_montage(&self, id: DbId, output: &MontageOutput) -> StoreResult<Option<Montage>>;

    /// `queued|processing -> failed`.
    async fn fail_montage(&self, id: DbId, error: &str) -> StoreResult<Option<Montage>>;

    /// `queued|processing -> cancelled`.
    async fn cancel_montage(&self, id: DbId) -> StoreResult<Option<Montage>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, user: &UpsertUser) -> StoreResult<User>;

    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>>;

    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>>;

    async fn set_user_limits(&self, id: DbId, limits: &UserLimits) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit_log(&self, entry: &CreateAuditLog) -> StoreResult<AuditLog>;

    async fn recent_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>>;
}

/// Every table plus a liveness probe.
#[async_trait]
pub trait Store: JobStore + ClipStore + MontageStore + UserStore + AuditStore {
    async fn ping(&self) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn Store>;

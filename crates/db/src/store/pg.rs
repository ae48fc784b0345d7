use async_trait::async_trait;
use clipcraftr_core::media::{ClipMetadata, ProcessingStep};
use clipcraftr_core::types::{DbId, Timestamp};

use super::{AuditStore, ClipStore, JobStore, MontageStore, Store, StoreResult, UserStore};
use crate::models::audit::{AuditLog, CreateAuditLog};
use crate::models::clip::{Clip, ClipFilter, NewClip};
use crate::models::job::{Job, JobFilter, NewJob};
use crate::models::montage::{Montage, MontageFilter, MontageOutput, NewMontage};
use crate::models::user::{UpsertUser, User, UserLimits};
use crate::repositories::{AuditLogRepo, ClipRepo, JobRepo, MontageRepo, UserRepo};
use crate::DbPool;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, job: &NewJob) -> StoreResult<Job> {
        Ok(JobRepo::create(&self.pool, job).await?)
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_active_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        Ok(JobRepo::list_active(&self.pool, filter).await?)
    }

    async fn list_recoverable_jobs(&self, job_type: &str) -> StoreResult<Vec<Job>> {
        Ok(JobRepo::list_recoverable(&self.pool, job_type).await?)
    }

    async fn mark_processing(&self, id: DbId, deadline: Timestamp) -> StoreResult<Option<Job>> {
        Ok(JobRepo::mark_processing(&self.pool, id, deadline).await?)
    }

    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<Option<Job>> {
        Ok(JobRepo::complete(&self.pool, id, result).await?)
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<Option<Job>> {
        Ok(JobRepo::fail(&self.pool, id, error).await?)
    }

    async fn reset_to_pending(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(JobRepo::reset_to_pending(&self.pool, id).await?)
    }

    async fn list_expired_jobs(&self, now: Timestamp) -> StoreResult<Vec<Job>> {
        Ok(JobRepo::list_expired(&self.pool, now).await?)
    }

    async fn delete_pending_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(JobRepo::delete_pending(&self.pool, id).await?)
    }
}

#[async_trait]
impl ClipStore for PgStore {
    async fn insert_clip_checked(&self, clip: &NewClip, queue_limit: i32) -> StoreResult<Clip> {
        ClipRepo::create_checked(&self.pool, clip, queue_limit).await
    }

    async fn find_clip(&self, id: DbId) -> StoreResult<Option<Clip>> {
        Ok(ClipRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_clips(&self, ids: &[DbId]) -> StoreResult<Vec<Clip>> {
        Ok(ClipRepo::find_by_ids(&self.pool, ids).await?)
    }

    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<Vec<Clip>> {
        Ok(ClipRepo::list(&self.pool, filter).await?)
    }

    async fn count_active_clips(&self, user_id: DbId) -> StoreResult<i64> {
        Ok(ClipRepo::count_active(&self.pool, user_id).await?)
    }

    async fn start_clip_processing(&self, id: DbId) -> StoreResult<Option<Clip>> {
        Ok(ClipRepo::start_processing(&self.pool, id).await?)
    }

    async fn mark_clip_ready(&self, id: DbId, metadata: &ClipMetadata) -> StoreResult<Option<Clip>> {
        Ok(ClipRepo::mark_ready(&self.pool, id, metadata).await?)
    }

    async fn mark_clip_error(&self, id: DbId, error: &str) -> StoreResult<Option<Clip>> {
        Ok(ClipRepo::mark_error(&self.pool, id, error).await?)
    }

    async fn soft_delete_clip(&self, id: DbId) -> StoreResult<Option<Clip>> {
        Ok(ClipRepo::soft_delete(&self.pool, id).await?)
    }

    async fn add_montage_ref(&self, clip_ids: &[DbId], montage_id: DbId) -> StoreResult<()> {
        Ok(ClipRepo::add_montage_ref(&self.pool, clip_ids, montage_id).await?)
    }
}

#[async_trait]
impl MontageStore for PgStore {
    async fn insert_montage(&self, montage: &NewMontage) -> StoreResult<Montage> {
        Ok(MontageRepo::create(&self.pool, montage).await?)
    }

    async fn find_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_montages(&self, filter: &MontageFilter) -> StoreResult<Vec<Montage>> {
        Ok(MontageRepo::list(&self.pool, filter).await?)
    }

    async fn start_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::start(&self.pool, id).await?)
    }

    async fn record_montage_progress(
        &self,
        id: DbId,
        steps: &[ProcessingStep],
        current_step: Option<&str>,
        progress: i32,
    ) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::record_progress(&self.pool, id, steps, current_step, progress).await?)
    }

    async fn complete_montage(&self, id: DbId, output: &MontageOutput) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::complete(&self.pool, id, output).await?)
    }

    async fn fail_montage(&self, id: DbId, error: &str) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::fail(&self.pool, id, error).await?)
    }

    async fn cancel_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        Ok(MontageRepo::cancel(&self.pool, id).await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_user(&self, user: &UpsertUser) -> StoreResult<User> {
        Ok(UserRepo::upsert(&self.pool, user).await?)
    }

    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_discord_id(&self.pool, discord_id).await?)
    }

    async fn set_user_limits(&self, id: DbId, limits: &UserLimits) -> StoreResult<Option<User>> {
        Ok(UserRepo::set_limits(&self.pool, id, limits).await?)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn insert_audit_log(&self, entry: &CreateAuditLog) -> StoreResult<AuditLog> {
        Ok(AuditLogRepo::insert(&self.pool, entry).await?)
    }

    async fn recent_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>> {
        Ok(AuditLogRepo::list_recent(&self.pool, limit).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

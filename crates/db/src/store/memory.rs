//! In-process store. Every table lives behind one `RwLock`, so each method
//! is atomic with respect to every other, including the check-then-insert
//! in [`ClipStore::insert_clip_checked`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use clipcraftr_core::error::CoreError;
use clipcraftr_core::media::{ClipMetadata, ProcessingStep};
use clipcraftr_core::scheduling::QueueKey;
use clipcraftr_core::status::{ClipStatus, JobStatus, MontageStatus};
use clipcraftr_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use super::{AuditStore, ClipStore, JobStore, MontageStore, Store, StoreResult, UserStore};
use crate::models::audit::{AuditLog, CreateAuditLog};
use crate::models::clip::{Clip, ClipFilter, NewClip};
use crate::models::job::{Job, JobFilter, NewJob};
use crate::models::montage::{Montage, MontageFilter, MontageOutput, NewMontage};
use crate::models::user::{UpsertUser, User, UserLimits};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    jobs: BTreeMap<DbId, Job>,
    clips: BTreeMap<DbId, Clip>,
    montages: BTreeMap<DbId, Montage>,
    users: BTreeMap<DbId, User>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Volatile store for tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn queue_key(job: &Job) -> QueueKey {
    QueueKey {
        priority: job.priority,
        created_at: job.created_at,
        id: job.id,
    }
}

/// Apply `update` to the job only when its status is `expected`.
fn transition_job(
    jobs: &mut BTreeMap<DbId, Job>,
    id: DbId,
    expected: JobStatus,
    update: impl FnOnce(&mut Job),
) -> Option<Job> {
    let job = jobs.get_mut(&id).filter(|j| j.status == expected)?;
    update(job);
    job.updated_at = Utc::now();
    Some(job.clone())
}

fn transition_clip(
    clips: &mut BTreeMap<DbId, Clip>,
    id: DbId,
    expected: &[ClipStatus],
    update: impl FnOnce(&mut Clip),
) -> Option<Clip> {
    let clip = clips.get_mut(&id).filter(|c| expected.contains(&c.status))?;
    update(clip);
    clip.updated_at = Utc::now();
    Some(clip.clone())
}

/// Apply `OFFSET`/`LIMIT` paging to rows already in order.
fn page<T>(rows: impl IntoIterator<Item = T>, offset: Option<i64>, limit: Option<i64>) -> Vec<T> {
    let offset = usize::try_from(offset.unwrap_or(0)).unwrap_or(0);
    let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));
    rows.into_iter().skip(offset).take(limit).collect()
}

fn transition_montage(
    montages: &mut BTreeMap<DbId, Montage>,
    id: DbId,
    expected: &[MontageStatus],
    update: impl FnOnce(&mut Montage),
) -> Option<Montage> {
    let montage = montages.get_mut(&id).filter(|m| expected.contains(&m.status))?;
    update(montage);
    montage.updated_at = Utc::now();
    Some(montage.clone())
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &NewJob) -> StoreResult<Job> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = Job {
            id: tables.next_id(),
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
            status: JobStatus::Pending,
            result: None,
            priority: job.priority,
            user_id: job.user_id.clone(),
            guild_id: job.guild_id.clone(),
            attempts: 0,
            deadline_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn list_active_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| j.status.is_active() && filter.matches(j))
            .cloned()
            .collect();
        jobs.sort_by_key(queue_key);

        Ok(page(jobs, filter.offset, filter.limit))
    }

    async fn list_recoverable_jobs(&self, job_type: &str) -> StoreResult<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| j.job_type == job_type && j.status.is_active())
            .cloned()
            .collect();
        jobs.sort_by_key(queue_key);
        Ok(jobs)
    }

    async fn mark_processing(&self, id: DbId, deadline: Timestamp) -> StoreResult<Option<Job>> {
        let mut tables = self.tables.write().await;
        Ok(transition_job(&mut tables.jobs, id, JobStatus::Pending, |job| {
            job.status = JobStatus::Processing;
            job.deadline_at = Some(deadline);
            job.attempts += 1;
        }))
    }

    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<Option<Job>> {
        let mut tables = self.tables.write().await;
        Ok(transition_job(&mut tables.jobs, id, JobStatus::Processing, |job| {
            job.status = JobStatus::Completed;
            job.result = Some(result.clone());
            job.deadline_at = None;
        }))
    }

    async fn fail_job(&self, id: DbId, error: &str) -> StoreResult<Option<Job>> {
        let mut tables = self.tables.write().await;
        Ok(transition_job(&mut tables.jobs, id, JobStatus::Processing, |job| {
            job.status = JobStatus::Failed;
            job.result = Some(serde_json::json!({ "error": error }));
            job.deadline_at = None;
        }))
    }

    async fn reset_to_pending(&self, id: DbId) -> StoreResult<Option<Job>> {
        let mut tables = self.tables.write().await;
        Ok(transition_job(&mut tables.jobs, id, JobStatus::Processing, |job| {
            job.status = JobStatus::Pending;
            job.deadline_at = None;
        }))
    }

    async fn list_expired_jobs(&self, now: Timestamp) -> StoreResult<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Processing && j.deadline_at.is_some_and(|d| d < now)
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.deadline_at);
        Ok(jobs)
    }

    async fn delete_pending_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        let mut tables = self.tables.write().await;
        let pending = tables
            .jobs
            .get(&id)
            .is_some_and(|j| j.status == JobStatus::Pending);
        Ok(if pending { tables.jobs.remove(&id) } else { None })
    }
}

// ---------------------------------------------------------------------------
// Clips
// ---------------------------------------------------------------------------

#[async_trait]
impl ClipStore for MemoryStore {
    async fn insert_clip_checked(&self, clip: &NewClip, queue_limit: i32) -> StoreResult<Clip> {
        let mut tables = self.tables.write().await;

        let active = tables
            .clips
            .values()
            .filter(|c| c.user_id == clip.user_id && c.status.counts_against_limit())
            .count() as i64;
        if active >= i64::from(queue_limit) {
            return Err(CoreError::Conflict(format!(
                "Queue limit reached: {active} of {queue_limit} clips are still being processed"
            ))
            .into());
        }

        if let Some(hash) = &clip.content_hash {
            let duplicate = tables.clips.values().any(|c| {
                c.user_id == clip.user_id
                    && c.status != ClipStatus::Deleted
                    && c.content_hash.as_deref() == Some(hash.as_str())
            });
            if duplicate {
                return Err(
                    CoreError::Conflict("This clip has already been submitted".to_string()).into(),
                );
            }
        }

        if tables.clips.values().any(|c| c.file_name == clip.file_name) {
            return Err(CoreError::Conflict(format!(
                "File name already in use: {}",
                clip.file_name
            ))
            .into());
        }

        let now = Utc::now();
        let row = Clip {
            id: tables.next_id(),
            user_id: clip.user_id,
            guild_id: clip.guild_id.clone(),
            channel_id: clip.channel_id.clone(),
            message_id: clip.message_id.clone(),
            original_name: clip.original_name.clone(),
            file_name: clip.file_name.clone(),
            file_url: clip.file_url.clone(),
            file_path: clip.file_path.clone(),
            file_size: clip.file_size,
            duration: clip.duration,
            mime_type: clip.mime_type.clone(),
            metadata: clip.metadata.clone(),
            status: ClipStatus::Uploading,
            error: None,
            priority: clip.priority,
            tags: clip.tags.clone(),
            used_in_montages: Vec::new(),
            is_public: false,
            content_hash: clip.content_hash.clone(),
            uploaded_at: now,
            processed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.clips.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_clip(&self, id: DbId) -> StoreResult<Option<Clip>> {
        Ok(self.tables.read().await.clips.get(&id).cloned())
    }

    async fn find_clips(&self, ids: &[DbId]) -> StoreResult<Vec<Clip>> {
        let tables = self.tables.read().await;
        Ok(tables
            .clips
            .values()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<Vec<Clip>> {
        let tables = self.tables.read().await;
        let clips = tables
            .clips
            .values()
            .rev()
            .filter(|c| filter.matches(c))
            .cloned();
        Ok(page(clips, filter.offset, filter.limit))
    }

    async fn count_active_clips(&self, user_id: DbId) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .clips
            .values()
            .filter(|c| c.user_id == user_id && c.status.counts_against_limit())
            .count() as i64)
    }

    async fn start_clip_processing(&self, id: DbId) -> StoreResult<Option<Clip>> {
        let mut tables = self.tables.write().await;
        Ok(transition_clip(
            &mut tables.clips,
            id,
            &[ClipStatus::Uploading, ClipStatus::Processing],
            |clip| {
                clip.status = ClipStatus::Processing;
                clip.error = None;
            },
        ))
    }

    async fn mark_clip_ready(&self, id: DbId, metadata: &ClipMetadata) -> StoreResult<Option<Clip>> {
        let mut tables = self.tables.write().await;
        Ok(transition_clip(&mut tables.clips, id, &[ClipStatus::Processing], |clip| {
            clip.status = ClipStatus::Ready;
            clip.metadata = metadata.clone();
            clip.processed_at = Some(Utc::now());
            clip.error = None;
        }))
    }

    async fn mark_clip_error(&self, id: DbId, error: &str) -> StoreResult<Option<Clip>> {
        let mut tables = self.tables.write().await;
        Ok(transition_clip(
            &mut tables.clips,
            id,
            &[ClipStatus::Uploading, ClipStatus::Processing],
            |clip| {
                clip.status = ClipStatus::Error;
                clip.error = Some(error.to_string());
            },
        ))
    }

    async fn soft_delete_clip(&self, id: DbId) -> StoreResult<Option<Clip>> {
        let mut tables = self.tables.write().await;
        Ok(transition_clip(
            &mut tables.clips,
            id,
            &[
                ClipStatus::Uploading,
                ClipStatus::Processing,
                ClipStatus::Ready,
                ClipStatus::Error,
            ],
            |clip| {
                clip.status = ClipStatus::Deleted;
                clip.deleted_at = Some(Utc::now());
            },
        ))
    }

    async fn add_montage_ref(&self, clip_ids: &[DbId], montage_id: DbId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        for id in clip_ids {
            if let Some(clip) = tables.clips.get_mut(id) {
                if !clip.used_in_montages.contains(&montage_id) {
                    clip.used_in_montages.push(montage_id);
                    clip.updated_at = now;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Montages
// ---------------------------------------------------------------------------

#[async_trait]
impl MontageStore for MemoryStore {
    async fn insert_montage(&self, montage: &NewMontage) -> StoreResult<Montage> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = Montage {
            id: tables.next_id(),
            user_id: montage.user_id,
            title: montage.title.clone(),
            description: montage.description.clone(),
            clips: montage.clips.clone(),
            settings: montage.settings.clone(),
            status: MontageStatus::Queued,
            priority: montage.priority,
            processing_steps: Vec::new(),
            current_step: None,
            progress: 0,
            output_path: None,
            duration: montage.duration,
            file_size: None,
            error: None,
            queued_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.montages.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        Ok(self.tables.read().await.montages.get(&id).cloned())
    }

    async fn list_montages(&self, filter: &MontageFilter) -> StoreResult<Vec<Montage>> {
        let tables = self.tables.read().await;
        let montages = tables
            .montages
            .values()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned();
        Ok(page(montages, filter.offset, filter.limit))
    }

    async fn start_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        let mut tables = self.tables.write().await;
        Ok(transition_montage(
            &mut tables.montages,
            id,
            &[MontageStatus::Queued, MontageStatus::Processing],
            |m| {
                m.status = MontageStatus::Processing;
                m.processing_steps.clear();
                m.current_step = None;
                m.progress = 0;
                m.error = None;
                m.started_at.get_or_insert_with(Utc::now);
            },
        ))
    }

    async fn record_montage_progress(
        &self,
        id: DbId,
        steps: &[ProcessingStep],
        current_step: Option<&str>,
        progress: i32,
    ) -> StoreResult<Option<Montage>> {
        let mut tables = self.tables.write().await;
        Ok(transition_montage(&mut tables.montages, id, &[MontageStatus::Processing], |m| {
            m.processing_steps = steps.to_vec();
            m.current_step = current_step.map(str::to_string);
            m.progress = progress.clamp(0, 99);
        }))
    }

    async fn complete_montage(&self, id: DbId, output: &MontageOutput) -> StoreResult<Option<Montage>> {
        let mut tables = self.tables.write().await;
        Ok(transition_montage(&mut tables.montages, id, &[MontageStatus::Processing], |m| {
            m.status = MontageStatus::Completed;
            m.progress = 100;
            m.output_path = Some(output.output_path.clone());
            m.duration = output.duration;
            m.file_size = output.file_size;
            m.current_step = None;
            m.error = None;
            m.completed_at.get_or_insert_with(Utc::now);
        }))
    }

    async fn fail_montage(&self, id: DbId, error: &str) -> StoreResult<Option<Montage>> {
        let mut tables = self.tables.write().await;
        Ok(transition_montage(
            &mut tables.montages,
            id,
            &[MontageStatus::Queued, MontageStatus::Processing],
            |m| {
                m.status = MontageStatus::Failed;
                m.error = Some(error.to_string());
                m.failed_at.get_or_insert_with(Utc::now);
            },
        ))
    }

    async fn cancel_montage(&self, id: DbId) -> StoreResult<Option<Montage>> {
        let mut tables = self.tables.write().await;
        Ok(transition_montage(
            &mut tables.montages,
            id,
            &[MontageStatus::Queued, MontageStatus::Processing],
            |m| {
                m.status = MontageStatus::Cancelled;
                m.cancelled_at.get_or_insert_with(Utc::now);
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, user: &UpsertUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables
            .users
            .values_mut()
            .find(|u| u.discord_id == user.discord_id)
        {
            existing.username = user.username.clone();
            existing.discriminator = user.discriminator.clone();
            existing.avatar = user.avatar.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let limits = UserLimits::default();
        let row = User {
            id: tables.next_id(),
            discord_id: user.discord_id.clone(),
            username: user.username.clone(),
            discriminator: user.discriminator.clone(),
            avatar: user.avatar.clone(),
            is_admin: false,
            queue_limit: limits.queue_limit,
            max_clip_duration: limits.max_clip_duration,
            max_montage_duration: limits.max_montage_duration,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.discord_id == discord_id)
            .cloned())
    }

    async fn set_user_limits(&self, id: DbId, limits: &UserLimits) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.queue_limit = limits.queue_limit;
            user.max_clip_duration = limits.max_clip_duration;
            user.max_montage_duration = limits.max_montage_duration;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_audit_log(&self, entry: &CreateAuditLog) -> StoreResult<AuditLog> {
        let mut tables = self.tables.write().await;
        let row = AuditLog {
            id: tables.next_id(),
            timestamp: Utc::now(),
            user_id: entry.user_id.clone(),
            action: entry.action.clone(),
            collection: entry.collection.clone(),
            document_id: entry.document_id.clone(),
            details: entry.details.clone(),
        };
        tables.audit_logs.push(row.clone());
        Ok(row)
    }

    async fn recent_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

//! Job dispatcher.
//!
//! Drives one job through `pending -> processing -> completed | failed` and
//! mirrors the outcome onto the clip or montage it references. Nothing
//! escapes [`Dispatcher::dispatch`]: every failure ends up on the job row,
//! in the audit trail and in the log.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clipcraftr_core::audit::{
    ACTION_JOB_COMPLETED, ACTION_JOB_FAILED, ACTION_JOB_STARTED, COLLECTION_JOBS, SYSTEM_ACTOR,
};
use clipcraftr_core::error::CoreError;
use clipcraftr_core::events::{
    CHANNEL_CLIP, CHANNEL_MONTAGE, CHANNEL_QUEUE, EVENT_COMPLETED, EVENT_FAILED, EVENT_STARTED,
    EVENT_STATUS,
};
use clipcraftr_core::payload::{referenced_id, validate_payload, JobPayload};
use clipcraftr_core::status::JobType;
use clipcraftr_core::types::DbId;
use clipcraftr_db::models::job::Job;
use clipcraftr_db::store::{ClipStore, JobStore, MontageStore};
use clipcraftr_events::AuditRecord;
use serde_json::{json, Value};

use crate::config::MAX_PROCESSING_TIMEOUT;
use crate::context::PipelineContext;
use crate::processor::{montage_step_count, MediaProcessor, ProcessingError};
use crate::tracker::StepTracker;

/// Slack between the processing timeout and the deadline the sweeper
/// enforces, so a timed-out dispatch records its own failure first.
const DEADLINE_GRACE_SECS: i64 = 30;

pub struct Dispatcher {
    ctx: PipelineContext,
    processor: Arc<dyn MediaProcessor>,
    processing_timeout: Duration,
    /// Timeout plus grace, added to the claim time to get the job deadline.
    deadline_window: chrono::Duration,
}

impl Dispatcher {
    /// `processing_timeout` is capped at [`MAX_PROCESSING_TIMEOUT`], so the
    /// enforced timeout and the recorded deadline always agree.
    pub fn new(
        ctx: PipelineContext,
        processor: Arc<dyn MediaProcessor>,
        processing_timeout: Duration,
    ) -> Self {
        let processing_timeout = processing_timeout.min(MAX_PROCESSING_TIMEOUT);
        let timeout_millis = i64::try_from(processing_timeout.as_millis()).unwrap_or(i64::MAX);
        let deadline_window = chrono::Duration::milliseconds(timeout_millis)
            + chrono::Duration::seconds(DEADLINE_GRACE_SECS);
        Self {
            ctx,
            processor,
            processing_timeout,
            deadline_window,
        }
    }

    /// Time from claim to the deadline the sweeper enforces.
    pub fn deadline_window(&self) -> chrono::Duration {
        self.deadline_window
    }

    /// Run one job. A job that is absent or no longer pending is skipped.
    pub async fn dispatch(&self, job_id: DbId) {
        let deadline = Utc::now() + self.deadline_window;

        let job = match self.ctx.store.mark_processing(job_id, deadline).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!(job_id, "Job is not pending, dispatch skipped");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to claim job");
                return;
            }
        };

        let actor = job.user_id.clone().unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        tracing::info!(job_id, job_type = %job.job_type, attempt = job.attempts, "Job started");
        self.ctx.record(
            AuditRecord::new(ACTION_JOB_STARTED, COLLECTION_JOBS)
                .by(&actor)
                .document(job.id)
                .details(json!({ "type": job.job_type, "attempt": job.attempts })),
        );
        self.ctx.emit(
            CHANNEL_QUEUE,
            EVENT_STARTED,
            json!({ "jobId": job.id, "jobType": job.job_type }),
        );

        let outcome = match job.job_type.parse::<JobType>() {
            Ok(JobType::Queue) => self.run_clip_job(&job).await,
            Ok(JobType::Montage) => self.run_montage_job(&job).await,
            Err(_) => Err(format!("Unknown job type: {}", job.job_type)),
        };

        match outcome {
            Ok(result) => self.finish_completed(&job, &actor, result).await,
            Err(message) => self.finish_failed(&job, &actor, &message).await,
        }
    }

    async fn with_timeout<T>(
        &self,
        work: impl Future<Output = Result<T, ProcessingError>>,
    ) -> Result<T, ProcessingError> {
        tokio::time::timeout(self.processing_timeout, work)
            .await
            .map_err(|_| ProcessingError::Timeout(self.processing_timeout.as_secs()))?
    }

    // -----------------------------------------------------------------------
    // Clip jobs
    // -----------------------------------------------------------------------

    async fn run_clip_job(&self, job: &Job) -> Result<Value, String> {
        match self.process_clip(job).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let message = e.to_string();
                if let Some(clip_id) = referenced_id(&job.payload, "clipId") {
                    self.mirror_clip_error(clip_id, &message).await;
                }
                Err(message)
            }
        }
    }

    async fn process_clip(&self, job: &Job) -> Result<Value, ProcessingError> {
        let JobPayload::Clip(payload) = validate_payload(&job.job_type, &job.payload)? else {
            return Err(CoreError::Internal("payload does not match job type".to_string()).into());
        };
        let store = &self.ctx.store;

        let clip = store.find_clip(payload.clip_id).await?.ok_or(CoreError::NotFound {
            entity: "Clip",
            id: payload.clip_id,
        })?;
        let clip = store.start_clip_processing(clip.id).await?.ok_or_else(|| {
            CoreError::Conflict(format!("Clip {} is {} and cannot be processed", clip.id, clip.status))
        })?;
        self.ctx.emit(
            CHANNEL_CLIP,
            EVENT_STATUS,
            json!({ "id": clip.id, "status": clip.status }),
        );

        let metadata = self.with_timeout(self.processor.process_clip(&clip)).await?;

        let ready = store.mark_clip_ready(clip.id, &metadata).await?.ok_or_else(|| {
            CoreError::Conflict(format!("Clip {} changed state during processing", clip.id))
        })?;
        self.ctx.emit(
            CHANNEL_CLIP,
            EVENT_STATUS,
            json!({ "id": ready.id, "status": ready.status, "metadata": ready.metadata }),
        );

        Ok(json!({ "clipId": ready.id, "metadata": metadata }))
    }

    async fn mirror_clip_error(&self, clip_id: DbId, message: &str) {
        match self.ctx.store.mark_clip_error(clip_id, message).await {
            Ok(Some(clip)) => self.ctx.emit(
                CHANNEL_CLIP,
                EVENT_STATUS,
                json!({ "id": clip.id, "status": clip.status, "error": message }),
            ),
            Ok(None) => tracing::debug!(clip_id, "Clip not in a failable state"),
            Err(e) => tracing::error!(clip_id, error = %e, "Failed to mark clip as errored"),
        }
    }

    // -----------------------------------------------------------------------
    // Montage jobs
    // -----------------------------------------------------------------------

    async fn run_montage_job(&self, job: &Job) -> Result<Value, String> {
        match self.process_montage(job).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let message = e.to_string();
                if let Some(montage_id) = referenced_id(&job.payload, "montageId") {
                    self.mirror_montage_failure(montage_id, &message).await;
                }
                Err(message)
            }
        }
    }

    async fn process_montage(&self, job: &Job) -> Result<Value, ProcessingError> {
        let JobPayload::Montage(payload) = validate_payload(&job.job_type, &job.payload)? else {
            return Err(CoreError::Internal("payload does not match job type".to_string()).into());
        };
        let store = &self.ctx.store;

        let montage = store
            .find_montage(payload.montage_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Montage",
                id: payload.montage_id,
            })?;
        let montage = store.start_montage(montage.id).await?.ok_or_else(|| {
            CoreError::Conflict(format!(
                "Montage {} is {} and cannot be rendered",
                montage.id, montage.status
            ))
        })?;
        self.ctx.emit(
            CHANNEL_MONTAGE,
            EVENT_STATUS,
            json!({ "id": montage.id, "status": montage.status, "progress": montage.progress }),
        );

        let clip_ids: Vec<DbId> = montage.clips.iter().map(|c| c.clip_id).collect();
        let clips = store.find_clips(&clip_ids).await?;
        let mut tracker = StepTracker::new(
            montage.id,
            store.clone(),
            self.ctx.bus.clone(),
            montage_step_count(montage.clips.len()),
        );

        let output = self
            .with_timeout(self.processor.render_montage(&montage, &clips, &mut tracker))
            .await?;

        let done = store.complete_montage(montage.id, &output).await?.ok_or_else(|| {
            CoreError::Conflict(format!("Montage {} was cancelled during rendering", montage.id))
        })?;
        self.ctx.emit(
            CHANNEL_MONTAGE,
            EVENT_STATUS,
            json!({
                "id": done.id,
                "status": done.status,
                "progress": done.progress,
                "outputPath": done.output_path,
            }),
        );

        Ok(json!({ "montageId": done.id, "outputPath": output.output_path }))
    }

    async fn mirror_montage_failure(&self, montage_id: DbId, message: &str) {
        match self.ctx.store.fail_montage(montage_id, message).await {
            Ok(Some(montage)) => self.ctx.emit(
                CHANNEL_MONTAGE,
                EVENT_STATUS,
                json!({ "id": montage.id, "status": montage.status, "error": message }),
            ),
            Ok(None) => tracing::debug!(montage_id, "Montage not in a failable state"),
            Err(e) => tracing::error!(montage_id, error = %e, "Failed to mark montage as failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Terminal transitions
    // -----------------------------------------------------------------------

    async fn finish_completed(&self, job: &Job, actor: &str, result: Value) {
        match self.ctx.store.complete_job(job.id, &result).await {
            Ok(Some(_)) => {
                tracing::info!(job_id = job.id, "Job completed");
                self.ctx.record(
                    AuditRecord::new(ACTION_JOB_COMPLETED, COLLECTION_JOBS)
                        .by(actor)
                        .document(job.id)
                        .details(result.clone()),
                );
                self.ctx.emit(
                    CHANNEL_QUEUE,
                    EVENT_COMPLETED,
                    json!({ "jobId": job.id, "result": result }),
                );
            }
            Ok(None) => {
                tracing::warn!(job_id = job.id, "Job was reclaimed before it completed");
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to mark job completed");
            }
        }
    }

    async fn finish_failed(&self, job: &Job, actor: &str, message: &str) {
        tracing::warn!(job_id = job.id, error = %message, "Job failed");
        match self.ctx.store.fail_job(job.id, message).await {
            Ok(Some(_)) => {
                self.ctx.record(
                    AuditRecord::new(ACTION_JOB_FAILED, COLLECTION_JOBS)
                        .by(actor)
                        .document(job.id)
                        .details(json!({ "error": message })),
                );
                self.ctx.emit(
                    CHANNEL_QUEUE,
                    EVENT_FAILED,
                    json!({ "jobId": job.id, "error": message }),
                );
            }
            Ok(None) => {
                tracing::warn!(job_id = job.id, "Job was reclaimed before it failed");
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to mark job failed");
            }
        }
    }
}

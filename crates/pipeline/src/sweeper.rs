//! Reclaims jobs stuck in `processing` past their deadline.
//!
//! A reclaimed job goes back to `pending` and is re-submitted, unless it has
//! already used `max_attempts`, in which case it is failed and the failure
//! is mirrored onto the clip or montage it references.

use std::time::Duration;

use chrono::Utc;
use clipcraftr_core::audit::{ACTION_JOB_FAILED, ACTION_JOB_RECLAIMED, COLLECTION_JOBS, SYSTEM_ACTOR};
use clipcraftr_core::events::{CHANNEL_CLIP, CHANNEL_MONTAGE, CHANNEL_QUEUE, EVENT_FAILED, EVENT_STATUS};
use clipcraftr_core::payload::referenced_id;
use clipcraftr_core::status::JobType;
use clipcraftr_core::types::Timestamp;
use clipcraftr_db::models::job::Job;
use clipcraftr_db::store::{ClipStore, JobStore, MontageStore};
use clipcraftr_db::StoreError;
use clipcraftr_events::AuditRecord;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::worker_pool::DispatchHandle;

pub const DEADLINE_EXCEEDED: &str = "Processing deadline exceeded";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reclaimed: usize,
    pub failed: usize,
}

pub struct Sweeper {
    ctx: PipelineContext,
    dispatch: DispatchHandle,
    interval: Duration,
    max_attempts: i32,
}

impl Sweeper {
    pub fn new(
        ctx: PipelineContext,
        dispatch: DispatchHandle,
        interval: Duration,
        max_attempts: i32,
    ) -> Self {
        Self {
            ctx,
            dispatch,
            interval,
            max_attempts,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_attempts = self.max_attempts,
            "Stuck-job sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stuck-job sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(report) if report.reclaimed + report.failed > 0 => {
                            tracing::info!(
                                reclaimed = report.reclaimed,
                                failed = report.failed,
                                "Sweeper reclaimed stuck jobs"
                            );
                        }
                        Ok(_) => tracing::debug!("Sweeper: no stuck jobs"),
                        Err(e) => tracing::error!(error = %e, "Sweep failed"),
                    }
                }
            }
        }
    }

    /// One pass over the jobs whose deadline is before `now`.
    pub async fn sweep_once(&self, now: Timestamp) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();

        for job in self.ctx.store.list_expired_jobs(now).await? {
            if job.attempts >= self.max_attempts {
                if self.give_up(&job).await? {
                    report.failed += 1;
                }
                continue;
            }

            if self.ctx.store.reset_to_pending(job.id).await?.is_some() {
                tracing::warn!(job_id = job.id, attempts = job.attempts, "Reclaimed stuck job");
                self.ctx.record(
                    AuditRecord::new(ACTION_JOB_RECLAIMED, COLLECTION_JOBS)
                        .by(SYSTEM_ACTOR)
                        .document(job.id)
                        .details(json!({ "attempts": job.attempts })),
                );
                self.dispatch.submit(job.id);
                report.reclaimed += 1;
            }
        }

        Ok(report)
    }

    async fn give_up(&self, job: &Job) -> Result<bool, StoreError> {
        if self.ctx.store.fail_job(job.id, DEADLINE_EXCEEDED).await?.is_none() {
            return Ok(false);
        }

        tracing::warn!(job_id = job.id, attempts = job.attempts, "Job exceeded its processing deadline");
        self.ctx.record(
            AuditRecord::new(ACTION_JOB_FAILED, COLLECTION_JOBS)
                .by(SYSTEM_ACTOR)
                .document(job.id)
                .details(json!({ "error": DEADLINE_EXCEEDED, "attempts": job.attempts })),
        );
        self.ctx.emit(
            CHANNEL_QUEUE,
            EVENT_FAILED,
            json!({ "jobId": job.id, "error": DEADLINE_EXCEEDED }),
        );

        match job.job_type.parse::<JobType>() {
            Ok(JobType::Queue) => {
                if let Some(id) = referenced_id(&job.payload, "clipId") {
                    if let Some(clip) = self.ctx.store.mark_clip_error(id, DEADLINE_EXCEEDED).await? {
                        self.ctx.emit(
                            CHANNEL_CLIP,
                            EVENT_STATUS,
                            json!({ "id": clip.id, "status": clip.status, "error": DEADLINE_EXCEEDED }),
                        );
                    }
                }
            }
            Ok(JobType::Montage) => {
                if let Some(id) = referenced_id(&job.payload, "montageId") {
                    if let Some(montage) = self.ctx.store.fail_montage(id, DEADLINE_EXCEEDED).await? {
                        self.ctx.emit(
                            CHANNEL_MONTAGE,
                            EVENT_STATUS,
                            json!({ "id": montage.id, "status": montage.status, "error": DEADLINE_EXCEEDED }),
                        );
                    }
                }
            }
            Err(_) => {}
        }
        Ok(true)
    }
}

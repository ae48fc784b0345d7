//! Queue API: enqueue, list, position, remove and the mission status flag.

use clipcraftr_core::audit::{
    ACTION_JOB_ENQUEUED, ACTION_JOB_REMOVED, ACTION_MISSION_STATUS, COLLECTION_JOBS,
    COLLECTION_SYSTEM, SYSTEM_ACTOR,
};
use clipcraftr_core::error::CoreError;
use clipcraftr_core::events::{CHANNEL_QUEUE, EVENT_ADDED, EVENT_REMOVED, EVENT_STATUS};
use clipcraftr_core::payload::validate_payload;
use clipcraftr_core::scheduling::{compute_position, QueuePosition};
use clipcraftr_core::status::{JobStatus, MissionStatus};
use clipcraftr_core::types::DbId;
use clipcraftr_db::models::job::{Job, JobFilter, NewJob};
use clipcraftr_db::store::JobStore;
use clipcraftr_events::AuditRecord;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::worker_pool::DispatchHandle;

/// Page size when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a listing may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct QueueService {
    ctx: PipelineContext,
    dispatch: DispatchHandle,
    mission: RwLock<MissionStatus>,
}

impl QueueService {
    pub fn new(ctx: PipelineContext, dispatch: DispatchHandle) -> Self {
        Self {
            ctx,
            dispatch,
            mission: RwLock::new(MissionStatus::default()),
        }
    }

    /// Validate, persist a pending job and hand it to the worker pool
    /// without waiting for dispatch.
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        user_id: Option<String>,
        guild_id: Option<String>,
    ) -> PipelineResult<Job> {
        let parsed = validate_payload(job_type, &payload)?;

        let job = self
            .ctx
            .store
            .insert_job(&NewJob {
                job_type: job_type.to_string(),
                payload,
                priority: parsed.priority(),
                user_id,
                guild_id,
            })
            .await?;

        tracing::info!(job_id = job.id, job_type = %job.job_type, priority = job.priority, "Job enqueued");
        self.ctx.record(
            AuditRecord::new(ACTION_JOB_ENQUEUED, COLLECTION_JOBS)
                .by(job.user_id.as_deref().unwrap_or(SYSTEM_ACTOR))
                .document(job.id)
                .details(json!({ "type": job.job_type, "priority": job.priority })),
        );

        // Subscribers see `added` before the pool can publish `started`.
        self.emit_queue(EVENT_ADDED, json!({ "item": job })).await;
        self.dispatch.submit(job.id);
        Ok(job)
    }

    /// Pending and processing jobs in queue order.
    pub async fn list_queue(&self, filter: &JobFilter) -> PipelineResult<Vec<Job>> {
        let filter = JobFilter {
            limit: Some(
                filter
                    .limit
                    .unwrap_or(DEFAULT_PAGE_SIZE)
                    .clamp(1, MAX_PAGE_SIZE),
            ),
            offset: Some(filter.offset.unwrap_or(0).max(0)),
            ..filter.clone()
        };
        Ok(self.ctx.store.list_active_jobs(&filter).await?)
    }

    /// Where a queued job stands relative to every other queued job.
    pub async fn get_position(&self, job_id: DbId) -> PipelineResult<QueuePosition> {
        let queue = self
            .ctx
            .store
            .list_active_jobs(&JobFilter::default())
            .await?;
        let entries: Vec<(DbId, Option<&str>)> = queue
            .iter()
            .map(|j| (j.id, j.user_id.as_deref()))
            .collect();

        compute_position(&entries, job_id).ok_or_else(|| {
            CoreError::NotFound {
                entity: "Job",
                id: job_id,
            }
            .into()
        })
    }

    pub async fn get_job(&self, job_id: DbId) -> PipelineResult<Job> {
        self.ctx.store.find_job(job_id).await?.ok_or_else(|| {
            CoreError::NotFound {
                entity: "Job",
                id: job_id,
            }
            .into()
        })
    }

    /// Remove a job that has not started yet.
    pub async fn remove(&self, job_id: DbId, requestor: Option<&str>) -> PipelineResult<Job> {
        let job = self.get_job(job_id).await?;
        if job.status != JobStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} is {} and can no longer be removed",
                job.status
            ))
            .into());
        }

        let removed = self
            .ctx
            .store
            .delete_pending_job(job_id)
            .await?
            .ok_or_else(|| CoreError::Conflict(format!("Job {job_id} started before it could be removed")))?;

        tracing::info!(job_id, "Job removed from queue");
        self.ctx.record(
            AuditRecord::new(ACTION_JOB_REMOVED, COLLECTION_JOBS)
                .by(requestor.unwrap_or(SYSTEM_ACTOR))
                .document(job_id),
        );
        self.emit_queue(EVENT_REMOVED, json!({ "id": job_id })).await;
        Ok(removed)
    }

    pub async fn get_mission_status(&self) -> MissionStatus {
        *self.mission.read().await
    }

    pub async fn set_mission_status(&self, status: MissionStatus, actor: Option<&str>) {
        let previous = std::mem::replace(&mut *self.mission.write().await, status);

        tracing::info!(from = %previous, to = %status, "Mission status changed");
        self.ctx.record(
            AuditRecord::new(ACTION_MISSION_STATUS, COLLECTION_SYSTEM)
                .by(actor.unwrap_or(SYSTEM_ACTOR))
                .details(json!({ "from": previous, "to": status })),
        );
        self.ctx.emit(
            CHANNEL_QUEUE,
            EVENT_STATUS,
            json!({ "missionStatus": status }),
        );
    }

    /// Publish a queue change together with the first page of the queue.
    async fn emit_queue(&self, kind: &str, data: Value) {
        let queue = match self.list_queue(&JobFilter::default()).await {
            Ok(queue) => queue,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load queue snapshot");
                Vec::new()
            }
        };
        let mut data = data;
        if let Value::Object(fields) = &mut data {
            fields.insert("queue".to_string(), json!(queue));
        }
        self.ctx.emit(CHANNEL_QUEUE, kind, data);
    }
}

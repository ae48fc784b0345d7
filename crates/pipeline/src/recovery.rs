//! Startup recovery.
//!
//! Jobs of type `queue` left `pending` or `processing` by a previous process
//! are put back to `pending` and handed to the worker pool again. Run it
//! before the HTTP listener binds. Running it twice is harmless: the
//! dispatcher skips anything that is no longer pending.

use clipcraftr_core::audit::{ACTION_JOB_RECOVERED, COLLECTION_JOBS, SYSTEM_ACTOR};
use clipcraftr_core::status::{JobStatus, JobType};
use clipcraftr_db::store::JobStore;
use clipcraftr_db::StoreError;
use clipcraftr_events::AuditRecord;

use crate::context::PipelineContext;
use crate::worker_pool::DispatchHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs moved from `processing` back to `pending`.
    pub reset: usize,
    /// Jobs handed to the worker pool.
    pub redispatched: usize,
}

pub async fn recover(
    ctx: &PipelineContext,
    dispatch: &DispatchHandle,
) -> Result<RecoveryReport, StoreError> {
    let jobs = ctx
        .store
        .list_recoverable_jobs(JobType::Queue.as_str())
        .await?;
    let mut report = RecoveryReport::default();

    for job in jobs {
        let pending = match job.status {
            JobStatus::Processing => match ctx.store.reset_to_pending(job.id).await? {
                Some(_) => {
                    report.reset += 1;
                    ctx.record(
                        AuditRecord::new(ACTION_JOB_RECOVERED, COLLECTION_JOBS)
                            .by(SYSTEM_ACTOR)
                            .document(job.id),
                    );
                    true
                }
                // Finished between the listing and the reset.
                None => false,
            },
            JobStatus::Pending => true,
            _ => false,
        };

        if pending && dispatch.submit(job.id) {
            report.redispatched += 1;
        }
    }

    tracing::info!(
        reset = report.reset,
        redispatched = report.redispatched,
        "Recovery finished"
    );
    Ok(report)
}

//! Bounded dispatch.
//!
//! Job ids arrive on an unbounded channel through [`DispatchHandle`]; the
//! [`WorkerPool`] runs at most `max_concurrent_jobs` dispatches at once and,
//! once cancelled, waits for the in-flight ones to drain.

use std::sync::Arc;

use clipcraftr_core::types::DbId;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dispatcher::Dispatcher;

/// Submits job ids to the pool without waiting for dispatch.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::UnboundedSender<DbId>,
}

impl DispatchHandle {
    /// Queue a job for dispatch. Returns `false` once the pool has stopped.
    pub fn submit(&self, job_id: DbId) -> bool {
        match self.sender.send(job_id) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(job_id, "Worker pool stopped, job left pending");
                false
            }
        }
    }
}

pub struct WorkerPool {
    dispatcher: Arc<Dispatcher>,
    receiver: mpsc::UnboundedReceiver<DbId>,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
}

impl WorkerPool {
    pub fn new(dispatcher: Arc<Dispatcher>, max_concurrent_jobs: usize) -> (Self, DispatchHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pool = Self {
            dispatcher,
            receiver,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            tasks: TaskTracker::new(),
        };
        (pool, DispatchHandle { sender })
    }

    /// Run until `cancel` fires or every handle is dropped, then drain.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            max_concurrent_jobs = self.permits.available_permits(),
            "Worker pool started",
        );

        loop {
            let job_id = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let dispatcher = self.dispatcher.clone();
            self.tasks.spawn(async move {
                dispatcher.dispatch(job_id).await;
                drop(permit);
            });
        }

        self.tasks.close();
        tracing::info!(in_flight = self.tasks.len(), "Worker pool draining");
        self.tasks.wait().await;
        tracing::info!("Worker pool stopped");
    }
}

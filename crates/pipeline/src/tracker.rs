//! Montage step recorder.
//!
//! The renderer announces each step through [`StepTracker`]; every change is
//! written to the montage row and published on `montageUpdate`. Persisting
//! progress is best-effort: a failed write is logged and rendering goes on.

use std::sync::Arc;

use chrono::Utc;
use clipcraftr_core::events::{CHANNEL_MONTAGE, EVENT_STATUS};
use clipcraftr_core::media::ProcessingStep;
use clipcraftr_core::status::StepStatus;
use clipcraftr_core::types::DbId;
use clipcraftr_db::store::{MontageStore, SharedStore};
use clipcraftr_events::EventBus;
use serde_json::json;

pub struct StepTracker {
    montage_id: DbId,
    store: SharedStore,
    bus: Arc<EventBus>,
    total_steps: usize,
    steps: Vec<ProcessingStep>,
}

impl StepTracker {
    pub fn new(montage_id: DbId, store: SharedStore, bus: Arc<EventBus>, total_steps: usize) -> Self {
        Self {
            montage_id,
            store,
            bus,
            total_steps: total_steps.max(1),
            steps: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    /// Percentage of finished steps, capped at 99 until the montage completes.
    pub fn progress(&self) -> i32 {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        ((done * 100 / self.total_steps) as i32).min(99)
    }

    /// Start a new step, closing nothing: callers finish the previous one first.
    pub async fn begin(&mut self, name: &str) {
        self.steps.push(ProcessingStep {
            name: name.to_string(),
            status: StepStatus::InProgress,
            started_at: Some(Utc::now()),
            completed_at: None,
            error: None,
            duration: None,
        });
        self.persist(Some(name.to_string())).await;
    }

    /// Mark the step in progress as completed.
    pub async fn complete(&mut self) {
        if self.close_current(StepStatus::Completed, None) {
            self.persist(None).await;
        }
    }

    /// Mark the step in progress as failed.
    pub async fn fail(&mut self, error: &str) {
        if self.close_current(StepStatus::Failed, Some(error.to_string())) {
            self.persist(None).await;
        }
    }

    fn close_current(&mut self, status: StepStatus, error: Option<String>) -> bool {
        let Some(step) = self
            .steps
            .iter_mut()
            .rev()
            .find(|s| s.status == StepStatus::InProgress)
        else {
            return false;
        };

        let now = Utc::now();
        step.status = status;
        step.error = error;
        if step.completed_at.is_none() {
            step.completed_at = Some(now);
            step.duration = step
                .started_at
                .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
        }
        true
    }

    async fn persist(&self, current_step: Option<String>) {
        let progress = self.progress();
        if let Err(e) = self
            .store
            .record_montage_progress(self.montage_id, &self.steps, current_step.as_deref(), progress)
            .await
        {
            tracing::warn!(montage_id = self.montage_id, error = %e, "Failed to record montage progress");
        }
        self.bus.emit(
            CHANNEL_MONTAGE,
            EVENT_STATUS,
            json!({
                "id": self.montage_id,
                "status": "processing",
                "currentStep": current_step,
                "progress": progress,
            }),
        );
    }
}

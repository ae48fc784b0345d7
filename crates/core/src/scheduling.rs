//! Queue ordering, priorities and the job state machine.
//!
//! This module lives in `core` (zero internal deps) so both the store
//! backends and the pipeline order jobs the same way.

use std::cmp::Ordering;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Highest accepted priority. Dispatched before all others.
pub const PRIORITY_MAX: i32 = 10;

/// Priority used for `"high"` submissions.
pub const PRIORITY_HIGH: i32 = 5;

/// Default priority.
pub const PRIORITY_NORMAL: i32 = 0;

/// Lowest accepted priority.
pub const PRIORITY_MIN: i32 = -10;

/// Resolve a submission priority label (`"normal"`, `"high"`) or a numeric
/// string into a priority value inside `PRIORITY_MIN..=PRIORITY_MAX`.
pub fn priority_from_label(label: &str) -> Result<i32, CoreError> {
    match label.trim().to_ascii_lowercase().as_str() {
        "" | "normal" => Ok(PRIORITY_NORMAL),
        "high" => Ok(PRIORITY_HIGH),
        other => {
            let value: i32 = other
                .parse()
                .map_err(|_| CoreError::Validation(format!("Invalid priority: '{label}'")))?;
            validate_priority(value)?;
            Ok(value)
        }
    }
}

/// Reject priorities outside `PRIORITY_MIN..=PRIORITY_MAX`.
pub fn validate_priority(value: i32) -> Result<(), CoreError> {
    if (PRIORITY_MIN..=PRIORITY_MAX).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Priority must be between {PRIORITY_MIN} and {PRIORITY_MAX}, got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Queue ordering
// ---------------------------------------------------------------------------

/// Sort key for queued jobs: priority descending, then creation time
/// ascending, then id ascending as the final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueKey {
    pub priority: i32,
    pub created_at: Timestamp,
    pub id: DbId,
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// SQL `ORDER BY` clause equivalent to [`QueueKey`] ordering.
pub const QUEUE_ORDER_SQL: &str = "priority DESC, created_at ASC, id ASC";

/// Position of one job inside the ordered queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePosition {
    /// 1-based index in the ordered queue.
    pub position: usize,
    /// Number of queued jobs.
    pub total: usize,
    /// Jobs ahead of this one owned by other users.
    pub ahead_count: usize,
}

/// Compute a job's position from the ordered `(id, owner)` queue entries.
///
/// Returns `None` when the job is not in the queue.
pub fn compute_position(entries: &[(DbId, Option<&str>)], job_id: DbId) -> Option<QueuePosition> {
    let index = entries.iter().position(|(id, _)| *id == job_id)?;
    let owner = entries[index].1;
    let ahead_count = entries[..index]
        .iter()
        .filter(|(_, other)| owner.is_none() || *other != owner)
        .count();

    Some(QueuePosition {
        position: index + 1,
        total: entries.len(),
        ahead_count,
    })
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Job transitions. Forward edges only, except the reclaim edge used by
/// startup recovery and the deadline sweeper.
pub mod state_machine {
    use crate::status::JobStatus;

    /// Returns the statuses reachable from `from` through normal dispatch.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Pending => &[JobStatus::Processing],
            JobStatus::Processing => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    /// Check whether `from -> to` is a valid dispatch transition.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// The single backwards edge: `processing -> pending`.
    pub fn can_reclaim(from: JobStatus) -> bool {
        from == JobStatus::Processing
    }

    /// Validate a dispatch transition, returning an error message for invalid ones.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {from} -> {to}"))
        }
    }
}

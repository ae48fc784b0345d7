//! Audit trail action and collection names.

pub const ACTION_JOB_ENQUEUED: &str = "job.enqueued";
pub const ACTION_JOB_REMOVED: &str = "job.removed";
pub const ACTION_JOB_STARTED: &str = "job.started";
pub const ACTION_JOB_COMPLETED: &str = "job.completed";
pub const ACTION_JOB_FAILED: &str = "job.failed";
pub const ACTION_JOB_RECOVERED: &str = "job.recovered";
pub const ACTION_JOB_RECLAIMED: &str = "job.reclaimed";
pub const ACTION_CLIP_SUBMITTED: &str = "clip.submitted";
pub const ACTION_CLIP_DELETED: &str = "clip.deleted";
pub const ACTION_MONTAGE_CREATED: &str = "montage.created";
pub const ACTION_MONTAGE_CANCELLED: &str = "montage.cancelled";
pub const ACTION_MISSION_STATUS: &str = "mission.status";

pub const COLLECTION_JOBS: &str = "jobs";
pub const COLLECTION_CLIPS: &str = "clips";
pub const COLLECTION_MONTAGES: &str = "montages";
pub const COLLECTION_SYSTEM: &str = "system";

/// Actor recorded for actions taken by the server itself.
pub const SYSTEM_ACTOR: &str = "system";

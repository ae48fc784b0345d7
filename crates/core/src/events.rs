//! Push channel names and event type discriminators.
//!
//! Used by the pipeline when publishing on the event bus and by the API's
//! WebSocket bridge when framing messages for clients.

/// Queue membership and job lifecycle updates.
pub const CHANNEL_QUEUE: &str = "queueUpdate";

/// Clip status updates.
pub const CHANNEL_CLIP: &str = "clipUpdate";

/// Montage status and progress updates.
pub const CHANNEL_MONTAGE: &str = "montageUpdate";

/// Every channel a client can receive.
pub const ALL_CHANNELS: [&str; 3] = [CHANNEL_QUEUE, CHANNEL_CLIP, CHANNEL_MONTAGE];

/// A job was enqueued.
pub const EVENT_ADDED: &str = "added";

/// A job was removed from the queue.
pub const EVENT_REMOVED: &str = "removed";

/// Mission status or entity status changed.
pub const EVENT_STATUS: &str = "status";

/// Dispatch started processing a job.
pub const EVENT_STARTED: &str = "started";

/// A job finished successfully.
pub const EVENT_COMPLETED: &str = "completed";

/// A job failed.
pub const EVENT_FAILED: &str = "failed";

/// An entity was created.
pub const EVENT_CREATED: &str = "created";

/// An entity was deleted.
pub const EVENT_DELETED: &str = "deleted";

//! ClipCraftr update broadcaster and audit trail.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`UpdateEvent`]s on the
//!   `queueUpdate`, `clipUpdate` and `montageUpdate` channels.
//! - [`AuditTrail`]: non-blocking handle that queues [`AuditRecord`]s for
//!   the background [`AuditWriter`].

pub mod audit;
pub mod bus;

pub use audit::{AuditRecord, AuditTrail, AuditWriter};
pub use bus::{EventBus, UpdateEvent};

//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod clip_repo;
pub mod job_repo;
pub mod montage_repo;
pub mod user_repo;

pub use audit_repo::AuditLogRepo;
pub use clip_repo::ClipRepo;
pub use job_repo::JobRepo;
pub use montage_repo::MontageRepo;
pub use user_repo::UserRepo;

//! Job queue and dispatch pipeline.
//!
//! Submission and the queue service persist work and hand job ids to the
//! [`WorkerPool`](worker_pool::WorkerPool), which runs the
//! [`Dispatcher`](dispatcher::Dispatcher) under bounded concurrency.
//! [`recovery`] resumes orphaned jobs at startup and the
//! [`Sweeper`](sweeper::Sweeper) reclaims jobs past their deadline.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod probe;
pub mod processor;
pub mod queue;
pub mod recovery;
pub mod submission;
pub mod sweeper;
pub mod tracker;
pub mod worker_pool;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use dispatcher::Dispatcher;
pub use error::PipelineError;
pub use queue::QueueService;
pub use submission::SubmissionService;
pub use worker_pool::{DispatchHandle, WorkerPool};

use clipcraftr_core::error::CoreError;
use clipcraftr_db::StoreError;

use crate::processor::ProcessingError;

/// Failure of a queue or submission operation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl From<StoreError> for PipelineError {
    /// Conditional-write rejections are domain errors, not store failures.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(core) => PipelineError::Core(core),
            other => PipelineError::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for PipelineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        PipelineError::Core(errors.into())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

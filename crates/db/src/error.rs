use clipcraftr_core::error::CoreError;

/// Failure of a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A conditional write refused the operation (duplicate, limit reached).
    #[error(transparent)]
    Rejected(#[from] CoreError),
}

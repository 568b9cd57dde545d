use flowtrack_core::error::CoreError;
use flowtrack_engine::EngineError;
use flowtrack_store::StoreError;

/// Errors surfaced synchronously by [`JobService`](crate::JobService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The process is shutting down and no longer starts tracking.
    #[error("Tracker is shutting down")]
    ShuttingDown,
}

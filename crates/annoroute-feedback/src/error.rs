//! Error types for completion feedback.

use annoroute_lifecycle::LifecycleError;
use annoroute_models::TaskStatus;
use annoroute_persistence::PersistenceError;
use annoroute_predict::PredictError;
use annoroute_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while recording feedback.
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// Malformed input, rejected with no state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The task was already completed; nothing was recorded.
    #[error("task already completed: {0}")]
    AlreadyCompleted(String),

    /// The task is not held by an annotator.
    #[error("task {task_id} is {status}, not assigned or in progress")]
    NotActive { task_id: String, status: TaskStatus },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type alias for feedback operations.
pub type Result<T> = std::result::Result<T, FeedbackError>;

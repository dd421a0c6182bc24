//! Error types for assignment passes.

use annoroute_lifecycle::LifecycleError;
use annoroute_models::TaskStatus;
use annoroute_persistence::PersistenceError;
use annoroute_predict::PredictError;
use annoroute_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while planning or applying assignments.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// A manual assignment named a pair that fails eligibility.
    #[error("annotator {annotator_id} is not eligible for task {task_id}: {reason}")]
    NotEligible {
        task_id: String,
        annotator_id: String,
        reason: String,
    },

    /// A manual assignment named a task that is not Pending.
    #[error("task {task_id} is {status}, not pending")]
    NotPending { task_id: String, status: TaskStatus },

    /// A manual assignment lost a compare-and-set race.
    #[error("assignment of task {0} conflicted with a concurrent change")]
    Conflict(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;

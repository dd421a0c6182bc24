//! Error types for the runtime crate.

use annoroute_events::EventError;
use annoroute_feedback::FeedbackError;
use annoroute_lifecycle::LifecycleError;
use annoroute_optimizer::OptimizerError;
use annoroute_persistence::PersistenceError;
use annoroute_predict::PredictError;
use annoroute_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced to callers of the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input; nothing changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown task or annotator id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request collides with current state, e.g. a repeat completion.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Anything the caller cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// True for errors caused by the request itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_) | ServiceError::NotFound(_) | ServiceError::Conflict(_)
        )
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => ServiceError::Validation(msg),
            RegistryError::NotFound(id) => ServiceError::NotFound(format!("annotator {}", id)),
            RegistryError::AlreadyExists(id) => {
                ServiceError::Conflict(format!("annotator already exists: {}", id))
            }
            e @ RegistryError::Unavailable { .. } => ServiceError::Conflict(e.to_string()),
            e @ RegistryError::Conflict { .. } => ServiceError::Conflict(e.to_string()),
            e => ServiceError::Internal(e.to_string()),
        }
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => ServiceError::Validation(msg),
            LifecycleError::NotFound(id) => ServiceError::NotFound(format!("task {}", id)),
            LifecycleError::AlreadyExists(id) => {
                ServiceError::Conflict(format!("task already exists: {}", id))
            }
            e @ LifecycleError::InvalidTransition { .. } => ServiceError::Conflict(e.to_string()),
            e @ LifecycleError::Conflict { .. } => ServiceError::Conflict(e.to_string()),
            e => ServiceError::Internal(e.to_string()),
        }
    }
}

impl From<OptimizerError> for ServiceError {
    fn from(err: OptimizerError) -> Self {
        match err {
            e @ OptimizerError::NotEligible { .. } => ServiceError::Validation(e.to_string()),
            e @ OptimizerError::NotPending { .. } => ServiceError::Conflict(e.to_string()),
            e @ OptimizerError::Conflict(_) => ServiceError::Conflict(e.to_string()),
            OptimizerError::Registry(e) => e.into(),
            OptimizerError::Lifecycle(e) => e.into(),
            OptimizerError::Predict(e) => e.into(),
            OptimizerError::Persistence(e) => e.into(),
        }
    }
}

impl From<FeedbackError> for ServiceError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation(msg) => ServiceError::Validation(msg),
            e @ FeedbackError::AlreadyCompleted(_) => ServiceError::Conflict(e.to_string()),
            e @ FeedbackError::NotActive { .. } => ServiceError::Conflict(e.to_string()),
            FeedbackError::Registry(e) => e.into(),
            FeedbackError::Lifecycle(e) => e.into(),
            FeedbackError::Predict(e) => e.into(),
            FeedbackError::Persistence(e) => e.into(),
        }
    }
}

impl From<PredictError> for ServiceError {
    fn from(err: PredictError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { kind, id } => {
                ServiceError::NotFound(format!("{} {}", kind, id))
            }
            e @ (PersistenceError::AlreadyExists { .. }
            | PersistenceError::VersionConflict { .. }) => ServiceError::Conflict(e.to_string()),
            e => ServiceError::Internal(e.to_string()),
        }
    }
}

impl From<EventError> for ServiceError {
    fn from(err: EventError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors from the background scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler not started.
    #[error("scheduler not started")]
    NotStarted,

    /// Scheduler already started.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// Shutdown error.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Errors from a complexity analyzer. Never reach callers of task intake.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The analyzer did not answer in time.
    #[error("analyzer timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The analyzer could not be reached or failed.
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),

    /// The analyzer answered with values out of range.
    #[error("invalid estimate: {0}")]
    InvalidEstimate(String),
}

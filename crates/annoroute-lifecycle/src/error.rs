//! Error types for task lifecycle operations.

use annoroute_models::TaskStatus;
use annoroute_persistence::PersistenceError;
use thiserror::Error;

/// Errors that can occur during task lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Malformed input, rejected with no state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Task id already taken.
    #[error("task already exists: {0}")]
    AlreadyExists(String),

    /// The state machine has no such edge.
    #[error("task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The task changed since the caller read it.
    #[error("task {id} version conflict: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned")]
    LockPoisoned,

    /// Persistence error.
    #[error("persistence error: {0}")]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for LifecycleError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { id, .. } => LifecycleError::NotFound(id),
            PersistenceError::AlreadyExists { id, .. } => LifecycleError::AlreadyExists(id),
            PersistenceError::VersionConflict {
                id,
                expected,
                actual,
                ..
            } => LifecycleError::Conflict {
                id,
                expected,
                actual,
            },
            PersistenceError::LockPoisoned => LifecycleError::LockPoisoned,
            other => LifecycleError::Persistence(other),
        }
    }
}

/// Result type alias for task lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

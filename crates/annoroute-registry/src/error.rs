//! Error types for registry operations.

use annoroute_persistence::PersistenceError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Malformed input, rejected with no state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown annotator id.
    #[error("annotator not found: {0}")]
    NotFound(String),

    /// Registration with an id that is already taken.
    #[error("annotator already exists: {0}")]
    AlreadyExists(String),

    /// The annotator cannot take the reservation right now.
    #[error("annotator {id} unavailable: {reason}")]
    Unavailable { id: String, reason: String },

    /// Compare-and-set kept losing to concurrent writers.
    #[error("annotator {id} update conflicted after {attempts} attempts")]
    Conflict { id: String, attempts: u32 },

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned")]
    LockPoisoned,

    /// Persistence error.
    #[error("persistence error: {0}")]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for RegistryError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { id, .. } => RegistryError::NotFound(id),
            PersistenceError::AlreadyExists { id, .. } => RegistryError::AlreadyExists(id),
            PersistenceError::LockPoisoned => RegistryError::LockPoisoned,
            other => RegistryError::Persistence(other),
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

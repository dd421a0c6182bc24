//! Error types for prediction operations.

use thiserror::Error;

/// Errors that can occur while training or serving predictors.
#[derive(Error, Debug)]
pub enum PredictError {
    /// Not enough labelled records to train.
    #[error("insufficient training data: have {have}, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// Training produced an unusable model.
    #[error("training failed: {0}")]
    Training(String),

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned")]
    LockPoisoned,
}

/// Result type alias for prediction operations.
pub type Result<T> = std::result::Result<T, PredictError>;

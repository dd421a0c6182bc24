//! Feedback loop configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// New labelled records that make a recalibration due.
    pub recalibration_batch: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            recalibration_batch: 100,
        }
    }
}

impl FeedbackConfig {
    /// Sets the number of labelled records per recalibration.
    pub fn with_recalibration_batch(mut self, batch: u64) -> Self {
        self.recalibration_batch = batch;
        self
    }
}

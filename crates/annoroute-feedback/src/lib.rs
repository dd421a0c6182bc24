//! Completion feedback for annotation task routing.
//!
//! The [`PerformanceFeedbackLoop`] turns a completed task and its realized
//! quality into the state changes that feed future assignments: the
//! annotator's performance history and workload, the labelled
//! `PredictionRecord`, and the predictor's per-pair statistics. After enough
//! new labels it reports that the predictor is due for recalibration.

pub mod config;
pub mod error;
pub mod feedback;

pub use config::FeedbackConfig;
pub use error::{FeedbackError, Result};
pub use feedback::{CompletionOutcome, PerformanceFeedbackLoop};

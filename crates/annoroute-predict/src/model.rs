//! The `Predictor` capability and the swappable model slot.

use std::fmt;
use std::sync::Arc;

use annoroute_models::FEATURE_COUNT;
use chrono::{DateTime, Utc};

/// A trained model mapping a feature row to a score.
///
/// Implementations are immutable once trained so they can be shared across
/// threads and outlive a model swap.
pub trait Predictor: Send + Sync + fmt::Debug {
    /// Scores one feature row.
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64;

    /// Short model name for logs.
    fn name(&self) -> &'static str;
}

/// The models serving predictions at one point in time.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    /// Regression model for predicted quality.
    pub quality: Option<Arc<dyn Predictor>>,
    /// Outlier scorer; higher is more atypical.
    pub anomaly: Option<Arc<dyn Predictor>>,
    /// Labelled records the models were trained on.
    pub samples: usize,
    /// Increments with every successful recalibration.
    pub generation: u64,
    /// When the models were trained.
    pub trained_at: Option<DateTime<Utc>>,
}

impl ModelSet {
    /// Returns true if a quality model is available.
    pub fn is_trained(&self) -> bool {
        self.quality.is_some()
    }
}

//! Optimizer configuration.

use serde::{Deserialize, Serialize};

/// Weights of the assignment cost terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Weight of `1 - skill`.
    pub skill: f64,
    /// Weight of `1 - predicted_quality`.
    pub quality: f64,
    /// Weight of the fatigue score.
    pub fatigue: f64,
    /// Weight of a cultural mismatch.
    pub cultural: f64,
    /// Weight of the priority boost, subtracted.
    pub priority: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            skill: 0.3,
            quality: 0.35,
            fatigue: 0.2,
            cultural: 0.1,
            priority: 0.05,
        }
    }
}

/// Configuration for assignment passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub weights: CostWeights,
    /// Above this many tasks or annotators the pass switches to greedy.
    pub greedy_threshold: usize,
    /// Anomaly score above which the penalty applies.
    pub anomaly_threshold: f64,
    /// Cost added for anomalous pairs.
    pub anomaly_penalty: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            greedy_threshold: 500,
            anomaly_threshold: 0.7,
            anomaly_penalty: 0.25,
        }
    }
}

impl OptimizerConfig {
    /// Sets the cost weights.
    pub fn with_weights(mut self, weights: CostWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the instance size above which greedy matching is used.
    pub fn with_greedy_threshold(mut self, threshold: usize) -> Self {
        self.greedy_threshold = threshold;
        self
    }

    /// Sets the anomaly threshold and penalty.
    pub fn with_anomaly_penalty(mut self, threshold: f64, penalty: f64) -> Self {
        self.anomaly_threshold = threshold;
        self.anomaly_penalty = penalty;
        self
    }
}

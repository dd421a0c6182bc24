//! Pair costs and their integer quantisation.

use crate::config::{CostWeights, OptimizerConfig};

/// Quantisation step: costs are compared at 1e-6 resolution.
pub const COST_SCALE: f64 = 1_000_000.0;

/// Cost of a pair that must not be matched. Larger than any sum of real
/// costs the solver can see, so it is only chosen when nothing else fits.
pub const FORBIDDEN: i64 = 1_000_000_000_000;

/// Per-pair signals that feed the cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostInputs {
    pub skill: f64,
    pub predicted_quality: f64,
    pub fatigue: f64,
    pub cultural_mismatch: bool,
    pub priority_boost: f64,
    pub anomaly_score: f64,
}

/// Weighted cost of a pair; lower is better.
pub fn pair_cost(inputs: &CostInputs, config: &OptimizerConfig) -> f64 {
    let CostWeights {
        skill,
        quality,
        fatigue,
        cultural,
        priority,
    } = config.weights;

    let mut cost = skill * (1.0 - inputs.skill.clamp(0.0, 1.0))
        + quality * (1.0 - inputs.predicted_quality.clamp(0.0, 1.0))
        + fatigue * inputs.fatigue.clamp(0.0, 1.0)
        + if inputs.cultural_mismatch { cultural } else { 0.0 }
        - priority * inputs.priority_boost.clamp(0.0, 1.0);

    if inputs.anomaly_score > config.anomaly_threshold {
        cost += config.anomaly_penalty;
    }
    cost
}

/// `priority / max_priority`, clamped to [0, 1]; 0 when no task is positive.
pub fn priority_boost(priority: i32, max_priority: i32) -> f64 {
    if max_priority <= 0 {
        return 0.0;
    }
    (priority as f64 / max_priority as f64).clamp(0.0, 1.0)
}

/// Rounds a cost to the solver's integer grid.
pub fn quantize(cost: f64) -> i64 {
    (cost * COST_SCALE).round() as i64
}

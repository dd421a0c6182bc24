//! Assignment optimizer for annotation task routing.
//!
//! An assignment pass reads one snapshot of Pending tasks and annotators
//! that accept work, prices every eligible pair, and solves a minimum-cost
//! bipartite matching:
//!
//! ```text
//! cost = w1 (1 - skill) + w2 (1 - predicted_quality) + w3 fatigue
//!      + w4 cultural_mismatch - w5 priority_boost (+ anomaly penalty)
//! ```
//!
//! Up to [`OptimizerConfig::greedy_threshold`] tasks and annotators the
//! matching is exact (Kuhn-Munkres, one task per annotator per pass, ties
//! broken toward the smaller annotator id for the higher-priority task).
//! Above it a greedy per-task heuristic is used and reported as such.
//!
//! Pairings are applied one at a time with compare-and-set on both the
//! annotator and the task, so concurrent passes never push an annotator
//! past capacity. Lost races drop the single pairing, not the pass.

pub mod config;
pub mod cost;
pub mod error;
pub mod greedy;
pub mod hungarian;
pub mod optimizer;

pub use config::{CostWeights, OptimizerConfig};
pub use cost::{pair_cost, priority_boost, CostInputs};
pub use error::{OptimizerError, Result};
pub use optimizer::{AssignmentOptimizer, AssignmentPlan, PlannedPairing};

//! Bagged regression-tree ensemble for predicted quality.

use annoroute_models::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PredictError, Result};
use crate::model::Predictor;
use crate::tree::{RegressionTree, TreeParams};

/// Ensemble size and tree limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    pub seed: u64,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            n_trees: 25,
            tree: TreeParams::default(),
            seed: 42,
        }
    }
}

/// Mean of regression trees, each grown on a bootstrap resample.
#[derive(Debug, Clone)]
pub struct BaggedTrees {
    trees: Vec<RegressionTree>,
}

impl BaggedTrees {
    /// Trains the ensemble. Identical inputs and seed give identical trees.
    pub fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        targets: &[f64],
        params: &EnsembleParams,
    ) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(PredictError::Training(format!(
                "{} rows for {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(PredictError::Training("ensemble needs at least one tree".to_string()));
        }

        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(rows, targets, sample, &params.tree)
            })
            .collect();

        Ok(Self { trees })
    }

    /// Number of trees.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns true if the ensemble has no trees.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl Predictor for BaggedTrees {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "bagged_trees"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        let rows: Vec<[f64; FEATURE_COUNT]> = (0..100)
            .map(|i| {
                let skill = i as f64 / 100.0;
                [0.5, skill, 0.5, (i % 3) as f64, 1.0]
            })
            .collect();
        let targets = rows.iter().map(|r| r[1]).collect();
        (rows, targets)
    }

    #[test]
    fn test_tracks_skill() {
        let (rows, targets) = linear_data();
        let model = BaggedTrees::fit(&rows, &targets, &EnsembleParams::default()).unwrap();

        let low = model.predict(&[0.5, 0.1, 0.5, 0.0, 1.0]);
        let high = model.predict(&[0.5, 0.9, 0.5, 0.0, 1.0]);

        assert!(high > low);
        assert!((high - 0.9).abs() < 0.15);
        assert!((low - 0.1).abs() < 0.15);
        assert_eq!(model.len(), 25);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (rows, targets) = linear_data();
        let params = EnsembleParams::default();
        let a = BaggedTrees::fit(&rows, &targets, &params).unwrap();
        let b = BaggedTrees::fit(&rows, &targets, &params).unwrap();

        let point = [0.3, 0.42, 0.6, 1.0, 0.0];
        assert_eq!(a.predict(&point), b.predict(&point));
    }

    #[test]
    fn test_rejects_empty() {
        let result = BaggedTrees::fit(&[], &[], &EnsembleParams::default());
        assert!(matches!(result, Err(PredictError::Training(_))));
    }
}

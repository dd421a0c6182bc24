//! Isolation forest for anomaly scoring.
//!
//! Atypical rows are isolated by fewer random splits. The score is
//! `2^(-E[h(x)] / c(n))`, where `h` is the path length and `c(n)` the
//! average path length of an unsuccessful BST search over `n` points.
//! Scores near 1 are anomalous; scores well below 0.5 are ordinary.

use annoroute_models::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PredictError, Result};
use crate::model::Predictor;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Forest size and subsample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationParams {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            sample_size: 64,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone)]
enum INode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct ITree {
    nodes: Vec<INode>,
}

impl ITree {
    fn path_length(&self, row: &[f64; FEATURE_COUNT]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(idx) {
                Some(INode::Leaf { size }) => return depth + average_path_length(*size),
                Some(INode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                None => return depth,
            }
        }
    }
}

/// Isolation forest over feature rows.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<ITree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Trains the forest on `rows`.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]], params: &IsolationParams) -> Result<Self> {
        if rows.len() < 2 {
            return Err(PredictError::Training(format!(
                "isolation forest needs at least 2 rows, got {}",
                rows.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(PredictError::Training("forest needs at least one tree".to_string()));
        }

        let sample_size = params.sample_size.clamp(2, rows.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut all: Vec<usize> = (0..rows.len()).collect();

        let trees = (0..params.n_trees)
            .map(|_| {
                all.shuffle(&mut rng);
                let sample = all[..sample_size].to_vec();
                let mut nodes = Vec::new();
                grow(&mut nodes, rows, sample, 0, height_limit, &mut rng);
                ITree { nodes }
            })
            .collect();

        Ok(Self { trees, sample_size })
    }
}

impl Predictor for IsolationForest {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(features))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.0;
        }
        2f64.powf(-mean_path / c)
    }

    fn name(&self) -> &'static str {
        "isolation_forest"
    }
}

fn grow(
    nodes: &mut Vec<INode>,
    rows: &[[f64; FEATURE_COUNT]],
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> usize {
    let idx = nodes.len();
    nodes.push(INode::Leaf { size: sample.len() });

    if depth >= height_limit || sample.len() <= 1 {
        return idx;
    }

    // Only features that still vary within the sample can split it
    let candidates: Vec<(usize, f64, f64)> = (0..FEATURE_COUNT)
        .filter_map(|f| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][f]), hi.max(rows[i][f]))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return idx;
    }

    let (feature, lo, hi) = candidates[rng.random_range(0..candidates.len())];
    let threshold = rng.random_range(lo..hi);

    let (left, right): (Vec<usize>, Vec<usize>) = sample
        .into_iter()
        .partition(|&i| rows[i][feature] < threshold);

    let left = grow(nodes, rows, left, depth + 1, height_limit, rng);
    let right = grow(nodes, rows, right, depth + 1, height_limit, rng);
    nodes[idx] = INode::Split {
        feature,
        threshold,
        left,
        right,
    };
    idx
}

/// Average path length of an unsuccessful search in a BST of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Vec<[f64; FEATURE_COUNT]> {
        (0..200)
            .map(|i| {
                let jitter = (i % 10) as f64 / 100.0;
                [0.5 + jitter, 0.6 - jitter, 0.7, (i % 2) as f64, 1.0]
            })
            .collect()
    }

    #[test]
    fn test_outlier_scores_higher() {
        let forest = IsolationForest::fit(&cluster(), &IsolationParams::default()).unwrap();

        let inlier = forest.predict(&[0.55, 0.55, 0.7, 1.0, 1.0]);
        let outlier = forest.predict(&[5.0, 5.0, 0.7, 9.0, 1.0]);

        assert!(outlier > inlier);
        assert!(outlier > 0.5);
        assert!((0.0..=1.0).contains(&inlier));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let rows = cluster();
        let params = IsolationParams::default();
        let a = IsolationForest::fit(&rows, &params).unwrap();
        let b = IsolationForest::fit(&rows, &params).unwrap();

        let point = [0.9, 0.1, 0.2, 3.0, 0.0];
        assert_eq!(a.predict(&point), b.predict(&point));
    }

    #[test]
    fn test_needs_two_rows() {
        let result = IsolationForest::fit(&[[0.0; FEATURE_COUNT]], &IsolationParams::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(64));
    }
}

//! CART regression trees.

use annoroute_models::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Growth limits for a regression tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 6,
            min_samples_leaf: 3,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Split {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// A regression tree grown by greedy variance reduction.
///
/// Nodes live in a flat arena; the root is node 0.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree on the rows selected by `indices`.
    ///
    /// `indices` may repeat rows, which is how bootstrap samples are passed.
    pub fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        targets: &[f64],
        indices: Vec<usize>,
        params: &TreeParams,
    ) -> Self {
        let mut nodes = Vec::new();
        grow(&mut nodes, rows, targets, indices, 0, params);
        Self { nodes }
    }

    /// Predicts the target for one row.
    pub fn predict(&self, row: &[f64; FEATURE_COUNT]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn grow(
    nodes: &mut Vec<Node>,
    rows: &[[f64; FEATURE_COUNT]],
    targets: &[f64],
    indices: Vec<usize>,
    depth: usize,
    params: &TreeParams,
) -> usize {
    let mean = if indices.is_empty() {
        0.0
    } else {
        indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
    };

    let idx = nodes.len();
    nodes.push(Node::Leaf { value: mean });

    if depth >= params.max_depth || indices.len() < params.min_samples_split {
        return idx;
    }

    let Some(split) = best_split(rows, targets, &indices, params) else {
        return idx;
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][split.feature] <= split.threshold);

    let left = grow(nodes, rows, targets, left, depth + 1, params);
    let right = grow(nodes, rows, targets, right, depth + 1, params);
    nodes[idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    idx
}

fn best_split(
    rows: &[[f64; FEATURE_COUNT]],
    targets: &[f64],
    indices: &[usize],
    params: &TreeParams,
) -> Option<Split> {
    let n = indices.len();
    let min_leaf = params.min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let total: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
    let parent_sse = total_sq - total * total / n as f64;

    let mut best: Option<Split> = None;
    let mut order = indices.to_vec();

    for feature in 0..FEATURE_COUNT {
        order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut sum_left = 0.0;
        let mut sq_left = 0.0;
        for pos in 1..n {
            let y = targets[order[pos - 1]];
            sum_left += y;
            sq_left += y * y;

            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            let lo = rows[order[pos - 1]][feature];
            let hi = rows[order[pos]][feature];
            if lo >= hi {
                continue;
            }

            let n_left = pos as f64;
            let n_right = (n - pos) as f64;
            let sum_right = total - sum_left;
            let sq_right = total_sq - sq_left;
            let sse = (sq_left - sum_left * sum_left / n_left)
                + (sq_right - sum_right * sum_right / n_right);

            if best.as_ref().map(|b| sse < b.sse).unwrap_or(true) {
                best = Some(Split {
                    feature,
                    threshold: (lo + hi) / 2.0,
                    sse,
                });
            }
        }
    }

    best.filter(|b| b.sse < parent_sse - 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        let rows: Vec<[f64; FEATURE_COUNT]> = (0..20)
            .map(|i| [0.5, i as f64 / 20.0, 0.5, 0.0, 1.0])
            .collect();
        let targets = rows
            .iter()
            .map(|r| if r[1] < 0.5 { 0.2 } else { 0.9 })
            .collect();
        (rows, targets)
    }

    #[test]
    fn test_learns_step_function() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, (0..20).collect(), &TreeParams::default());

        assert!((tree.predict(&[0.5, 0.1, 0.5, 0.0, 1.0]) - 0.2).abs() < 1e-9);
        assert!((tree.predict(&[0.5, 0.8, 0.5, 0.0, 1.0]) - 0.9).abs() < 1e-9);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_constant_targets_single_leaf() {
        let (rows, _) = step_data();
        let targets = vec![0.7; rows.len()];
        let tree = RegressionTree::fit(&rows, &targets, (0..20).collect(), &TreeParams::default());

        assert_eq!(tree.leaf_count(), 1);
        assert!((tree.predict(&rows[3]) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_depth_zero_is_mean() {
        let (rows, targets) = step_data();
        let params = TreeParams {
            max_depth: 0,
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(&rows, &targets, (0..20).collect(), &params);

        assert!((tree.predict(&rows[0]) - 0.55).abs() < 1e-9);
    }
}

//! Greedy per-task matching for large instances.
//!
//! Tasks are taken in priority order and each gets its cheapest annotator
//! with capacity left, ties to the smaller id. This runs in O(tasks x
//! annotators) and is an approximation. No matching of the same tasks can
//! cost less than the sum of each task's cheapest allowed pair, so the
//! greedy total exceeds the best such matching by at most
//! [`GreedyOutcome::gap`].

/// Result of a greedy matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreedyOutcome {
    /// Matched column per row.
    pub matching: Vec<Option<usize>>,
    /// Total cost of the matching.
    pub total: i64,
    /// Total minus the sum of the matched rows' cheapest allowed costs.
    pub gap: i64,
}

/// Greedy matching of rows to columns with per-column capacity.
///
/// `costs[r][c]` is `None` for a forbidden pair.
pub fn solve(costs: &[Vec<Option<i64>>], capacity: &[u32]) -> GreedyOutcome {
    let mut remaining = capacity.to_vec();
    let mut matching = Vec::with_capacity(costs.len());
    let mut total = 0i64;
    let mut bound = 0i64;

    for row in costs {
        let best = row
            .iter()
            .enumerate()
            .filter(|(c, _)| remaining.get(*c).copied().unwrap_or(0) > 0)
            .filter_map(|(c, cell)| cell.map(|cost| (cost, c)))
            .min();

        match best {
            Some((cost, col)) => {
                remaining[col] -= 1;
                total += cost;
                bound += row.iter().flatten().copied().min().unwrap_or(cost);
                matching.push(Some(col));
            }
            None => matching.push(None),
        }
    }

    GreedyOutcome {
        matching,
        total,
        gap: total - bound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takes_cheapest_with_capacity() {
        let costs = vec![
            vec![Some(1), Some(2)],
            vec![Some(1), Some(5)],
            vec![Some(1), Some(3)],
        ];
        let outcome = solve(&costs, &[2, 1]);

        assert_eq!(outcome.matching, vec![Some(0), Some(0), Some(1)]);
        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.gap, 2);
    }

    #[test]
    fn test_ties_go_to_smaller_id() {
        let costs = vec![vec![Some(4), Some(4)]];
        assert_eq!(solve(&costs, &[1, 1]).matching, vec![Some(0)]);
    }

    #[test]
    fn test_unmatched_when_no_capacity() {
        let costs = vec![vec![Some(1), None], vec![Some(1), None]];
        let outcome = solve(&costs, &[1, 3]);

        assert_eq!(outcome.matching, vec![Some(0), None]);
        assert_eq!(outcome.gap, 0);
    }
}

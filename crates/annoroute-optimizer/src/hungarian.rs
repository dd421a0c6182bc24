//! Kuhn-Munkres minimum-cost matching with an exact tie-break.
//!
//! Rows are tasks in priority order and columns are annotators in id order.
//! The rectangular matrix is padded to a square one with zero-cost dummy
//! rows or columns; forbidden cells get [`FORBIDDEN`] so they are only
//! chosen when no allowed completion exists, and are discarded afterwards.
//!
//! After solving, the optimal dual potentials identify the tight subgraph,
//! whose perfect matchings are exactly the minimum-cost matchings. Rows are
//! then fixed one at a time, in order, to the smallest allowed column that
//! still admits a perfect tight matching; a row with no such column is left
//! unmatched. The result is the lexicographically smallest optimal matching,
//! independent of the order the solver happened to find.
//!
//! Each row's fixing step runs one reverse search over the tight subgraph to
//! find which candidate columns can be freed, then at most one augmenting
//! search, both O(n^2). Together with the solver the pass stays O(n^3).

use std::collections::VecDeque;

use crate::cost::FORBIDDEN;

const INF: i64 = i64::MAX / 4;

/// Minimum-cost matching of rows to columns.
///
/// `costs[r][c]` is `None` for a forbidden pair; every row must have
/// `cols` entries. Returns the matched column for each row, or `None` when
/// the row is left unmatched.
pub fn solve(costs: &[Vec<Option<i64>>], cols: usize) -> Vec<Option<usize>> {
    let rows = costs.len();
    if rows == 0 || cols == 0 {
        return vec![None; rows];
    }

    let n = rows.max(cols);
    let matrix = square(costs, rows, cols, n);
    let (match_row, u, v) = kuhn_munkres(&matrix);

    let mut tight = TightMatching::new(&matrix, u, v, match_row);
    for (row, cells) in costs.iter().enumerate() {
        let allowed: Vec<usize> = (0..cols).filter(|&c| cells[c].is_some()).collect();
        tight.fix_first(row, &allowed);
    }

    (0..rows)
        .map(|row| {
            let col = tight.match_row[row];
            (col < cols && costs[row][col].is_some()).then_some(col)
        })
        .collect()
}

/// Square, non-negative cost matrix.
fn square(costs: &[Vec<Option<i64>>], rows: usize, cols: usize, n: usize) -> Vec<Vec<i64>> {
    let mut matrix = vec![vec![0i64; n]; n];
    for (r, row) in costs.iter().enumerate().take(rows) {
        for (c, cell) in row.iter().enumerate().take(cols) {
            matrix[r][c] = cell.unwrap_or(FORBIDDEN);
        }
    }

    let min = matrix.iter().flatten().copied().min().unwrap_or(0);
    if min < 0 {
        for cell in matrix.iter_mut().flatten() {
            *cell -= min;
        }
    }
    matrix
}

/// Shortest augmenting path Hungarian algorithm, O(n^3).
///
/// Returns the row-to-column matching and the row and column potentials,
/// which satisfy `u[r] + v[c] <= a[r][c]` with equality on the matching.
fn kuhn_munkres(a: &[Vec<i64>]) -> (Vec<usize>, Vec<i64>, Vec<i64>) {
    let n = a.len();
    // 1-based; index 0 is the virtual column used to start each search.
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![INF; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = a[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut match_row = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            match_row[p[j] - 1] = j - 1;
        }
    }
    (match_row, u[1..].to_vec(), v[1..].to_vec())
}

/// A perfect matching inside the tight subgraph, with fixed pairs.
struct TightMatching<'a> {
    matrix: &'a [Vec<i64>],
    u: Vec<i64>,
    v: Vec<i64>,
    match_row: Vec<usize>,
    match_col: Vec<usize>,
    locked_col: Vec<bool>,
}

impl<'a> TightMatching<'a> {
    fn new(matrix: &'a [Vec<i64>], u: Vec<i64>, v: Vec<i64>, match_row: Vec<usize>) -> Self {
        let n = matrix.len();
        let mut match_col = vec![0usize; n];
        for (r, &c) in match_row.iter().enumerate() {
            match_col[c] = r;
        }
        Self {
            matrix,
            u,
            v,
            match_row,
            match_col,
            locked_col: vec![false; n],
        }
    }

    fn is_tight(&self, r: usize, c: usize) -> bool {
        self.matrix[r][c] - self.u[r] - self.v[c] == 0
    }

    /// Fixes `row` to the first column in `candidates` that keeps a perfect
    /// tight matching. Rows with no such column stay free and end up on a
    /// dummy or forbidden column.
    fn fix_first(&mut self, row: usize, candidates: &[usize]) {
        let freeable = self.freeable(self.match_row[row]);
        for &col in candidates {
            if self.locked_col[col] || !freeable[col] || !self.is_tight(row, col) {
                continue;
            }
            if self.match_row[row] == col || self.reroute(row, col) {
                self.locked_col[col] = true;
                return;
            }
        }
    }

    /// Marks the columns whose holders can shift along unlocked tight edges
    /// until `target` is vacated. `target` itself is always freeable.
    fn freeable(&self, target: usize) -> Vec<bool> {
        let n = self.matrix.len();
        let mut freeable = vec![false; n];
        freeable[target] = true;
        let mut queue = VecDeque::from([target]);

        while let Some(free) = queue.pop_front() {
            for r in 0..n {
                let held = self.match_row[r];
                if freeable[held] || self.locked_col[held] || !self.is_tight(r, free) {
                    continue;
                }
                freeable[held] = true;
                queue.push_back(held);
            }
        }
        freeable
    }

    /// Moves `row` onto `col` by finding an alternating path from the row
    /// currently holding `col` back to `row`'s old column.
    fn reroute(&mut self, row: usize, col: usize) -> bool {
        let n = self.matrix.len();
        let target = self.match_row[row];
        let start = self.match_col[col];

        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut queue = VecDeque::from([start]);

        while let Some(r) = queue.pop_front() {
            for c in 0..n {
                if c == col || self.locked_col[c] || parent[c].is_some() || !self.is_tight(r, c) {
                    continue;
                }
                parent[c] = Some(r);
                if c == target {
                    self.augment(&parent, start, target);
                    self.match_row[row] = col;
                    self.match_col[col] = row;
                    return true;
                }
                queue.push_back(self.match_col[c]);
            }
        }
        false
    }

    fn augment(&mut self, parent: &[Option<usize>], start: usize, target: usize) {
        let mut c = target;
        while let Some(r) = parent[c] {
            let previous = self.match_row[r];
            self.match_row[r] = c;
            self.match_col[c] = r;
            if r == start {
                break;
            }
            c = previous;
        }
    }
}

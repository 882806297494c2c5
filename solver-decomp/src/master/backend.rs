//! LP solver abstraction consumed by the restricted master.

use sprs::{CsMat, TriMat};

use crate::error::DecompResult;

/// Status of an LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// Optimal solution found.
    Optimal,

    /// LP is infeasible.
    Infeasible,

    /// LP is unbounded (missing bound or modeling error).
    Unbounded,

    /// Numerical difficulties.
    NumericalFailure,
}

/// A linear program `min c^T x  s.t.  row_lb <= A x <= row_ub,  col_lb <= x <= col_ub`.
///
/// Rows with `row_lb == row_ub` are equalities. Infinite bounds are dropped.
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Objective coefficients (length n).
    pub objective: Vec<f64>,

    /// Constraint matrix (m x n, CSC).
    pub matrix: CsMat<f64>,

    /// Row lower bounds (length m).
    pub row_lb: Vec<f64>,

    /// Row upper bounds (length m).
    pub row_ub: Vec<f64>,

    /// Column lower bounds (length n).
    pub col_lb: Vec<f64>,

    /// Column upper bounds (length n).
    pub col_ub: Vec<f64>,
}

impl LpProblem {
    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.objective.len()
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.row_lb.len()
    }

    /// Row activities A x.
    pub fn row_activity(&self, x: &[f64]) -> Vec<f64> {
        let mut act = vec![0.0; self.num_rows()];
        for (j, col) in self.matrix.outer_iterator().enumerate() {
            for (i, &a) in col.iter() {
                act[i] += a * x[j];
            }
        }
        act
    }
}

/// Result from an LP solve.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Solve status.
    pub status: LpStatus,

    /// Primal values (length n).
    pub primal: Vec<f64>,

    /// Row duals y (length m), with reduced costs `c - A^T y`.
    /// `y_r >= 0` when the lower side is active, `y_r <= 0` at the upper side.
    pub duals: Vec<f64>,

    /// Objective value.
    pub objective: f64,
}

impl LpSolution {
    /// Create a result carrying only a non-optimal status.
    pub fn with_status(status: LpStatus) -> Self {
        Self {
            status,
            primal: Vec::new(),
            duals: Vec::new(),
            objective: f64::INFINITY,
        }
    }
}

/// Trait for LP solver backends.
///
/// The restricted master owns the LP state and hands a complete problem to
/// the backend on every solve; backends may keep internal caches.
pub trait LpSolver: Send {
    /// Solve the LP.
    ///
    /// Solver failures that are not a status (bad input, internal errors)
    /// are returned as errors.
    fn solve(&mut self, lp: &LpProblem) -> DecompResult<LpSolution>;

    /// Reset internal state before retrying after a numerical failure.
    fn reset(&mut self) {}

    /// Backend name for logging.
    fn name(&self) -> &str {
        "lp"
    }
}

/// Convert triplets to CSC sparse matrix.
pub fn triplets_to_csc(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> CsMat<f64> {
    let mut tri = TriMat::new((nrows, ncols));
    for &(row, col, val) in triplets {
        tri.add_triplet(row, col, val);
    }
    tri.to_csc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_activity() {
        // [1 2]
        // [0 3]
        let lp = LpProblem {
            objective: vec![0.0, 0.0],
            matrix: triplets_to_csc(2, 2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]),
            row_lb: vec![0.0, 0.0],
            row_ub: vec![1.0, 1.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![1.0, 1.0],
        };
        assert_eq!(lp.num_rows(), 2);
        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.row_activity(&[1.0, 2.0]), vec![5.0, 6.0]);
    }

    #[test]
    fn test_empty_triplets_keep_shape() {
        let m = triplets_to_csc(3, 4, &[]);
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 4);
        assert_eq!(m.nnz(), 0);
    }

    #[test]
    fn test_non_optimal_result() {
        let sol = LpSolution::with_status(LpStatus::Infeasible);
        assert_eq!(sol.status, LpStatus::Infeasible);
        assert!(sol.primal.is_empty());
    }
}

//! LP backend using the Clarabel interior-point solver.
//!
//! Ranged rows are split into conic form:
//! ```text
//! min  c^T x
//! s.t.  a_r^T x + s = b_r,     s in {0}     (equalities)
//!       a_r^T x + s = ub_r,    s >= 0       (finite upper sides)
//!      -a_r^T x + s = -lb_r,   s >= 0       (finite lower sides)
//!       x_j + s = ub_j,        s >= 0       (column bounds)
//!      -x_j + s = -lb_j,       s >= 0
//! ```
//! and the row duals are folded back as `y_r = z_lb - z_ub` (equalities: `y_r = -z_r`).

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::{LpProblem, LpSolution, LpSolver, LpStatus};
use crate::error::{DecompError, DecompResult};

/// Where a conic row came from, for mapping duals back.
#[derive(Debug, Clone, Copy)]
enum ConicRow {
    /// Equality row r.
    Equality(usize),
    /// Upper side of row r.
    Upper(usize),
    /// Lower side of row r.
    Lower(usize),
    /// Column bound (no row dual).
    Bound,
}

/// Tunables forwarded to Clarabel.
#[derive(Debug, Clone)]
pub struct ClarabelOptions {
    /// Iteration limit.
    pub max_iter: u32,

    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,

    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,

    /// Feasibility tolerance.
    pub tol_feas: f64,

    /// Use Ruiz equilibration.
    pub equilibrate: bool,
}

impl Default for ClarabelOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            tol_feas: 1e-9,
            equilibrate: true,
        }
    }
}

impl ClarabelOptions {
    /// Settings used after a numerical failure.
    pub fn conservative() -> Self {
        Self {
            max_iter: 500,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            tol_feas: 1e-8,
            equilibrate: false,
        }
    }
}

/// LP solver backed by Clarabel.
pub struct ClarabelLpSolver {
    options: ClarabelOptions,
    /// Options restored after a successful retry.
    base_options: ClarabelOptions,
}

impl ClarabelLpSolver {
    /// Create a backend with the given options.
    pub fn new(options: ClarabelOptions) -> Self {
        Self {
            base_options: options.clone(),
            options,
        }
    }

    fn settings(&self) -> DefaultSettings<f64> {
        DefaultSettings {
            verbose: false,
            max_iter: self.options.max_iter,
            tol_gap_abs: self.options.tol_gap_abs,
            tol_gap_rel: self.options.tol_gap_rel,
            tol_feas: self.options.tol_feas,
            equilibrate_enable: self.options.equilibrate,
            ..DefaultSettings::default()
        }
    }

    /// Build (A, b, cones, row origins) in Clarabel form.
    fn build_conic(
        lp: &LpProblem,
    ) -> DecompResult<(CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>, Vec<ConicRow>)> {
        let n = lp.num_cols();
        let m = lp.num_rows();
        if lp.matrix.rows() != m || lp.matrix.cols() != n {
            return Err(DecompError::LpSolver(format!(
                "matrix is {}x{} but problem has {} rows and {} columns",
                lp.matrix.rows(),
                lp.matrix.cols(),
                m,
                n
            )));
        }

        // Row-wise coefficient lists, needed to emit rows in cone order.
        let mut row_coefs: Vec<Vec<(usize, f64)>> = vec![Vec::new(); m];
        for (j, col) in lp.matrix.outer_iterator().enumerate() {
            for (i, &a) in col.iter() {
                row_coefs[i].push((j, a));
            }
        }

        let num_eq = (0..m).filter(|&r| lp.row_lb[r] == lp.row_ub[r]).count();
        let mut origins = Vec::new();
        let mut b = Vec::new();
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];

        let mut emit = |origin: ConicRow, coefs: &[(usize, f64)], sign: f64, rhs: f64| {
            let r = origins.len();
            for &(j, a) in coefs {
                cols[j].push((r, sign * a));
            }
            origins.push(origin);
            b.push(rhs);
        };

        for (r, coefs) in row_coefs.iter().enumerate() {
            if lp.row_lb[r] == lp.row_ub[r] {
                emit(ConicRow::Equality(r), coefs, 1.0, lp.row_ub[r]);
            }
        }
        for (r, coefs) in row_coefs.iter().enumerate() {
            if lp.row_lb[r] == lp.row_ub[r] {
                continue;
            }
            if lp.row_ub[r].is_finite() {
                emit(ConicRow::Upper(r), coefs, 1.0, lp.row_ub[r]);
            }
            if lp.row_lb[r].is_finite() {
                emit(ConicRow::Lower(r), coefs, -1.0, -lp.row_lb[r]);
            }
        }
        for j in 0..n {
            if lp.col_ub[j].is_finite() {
                emit(ConicRow::Bound, &[(j, 1.0)], 1.0, lp.col_ub[j]);
            }
            if lp.col_lb[j].is_finite() {
                emit(ConicRow::Bound, &[(j, 1.0)], -1.0, -lp.col_lb[j]);
            }
        }

        let total = b.len();
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for col in &mut cols {
            col.sort_by_key(|&(r, _)| r);
            for &(r, v) in col.iter() {
                rowval.push(r);
                nzval.push(v);
            }
            colptr.push(rowval.len());
        }

        let mut cones = Vec::new();
        if num_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_eq));
        }
        if total > num_eq {
            cones.push(SupportedConeT::NonnegativeConeT(total - num_eq));
        }

        Ok((CscMatrix::new(total, n, colptr, rowval, nzval), b, cones, origins))
    }
}

impl Default for ClarabelLpSolver {
    fn default() -> Self {
        Self::new(ClarabelOptions::default())
    }
}

impl LpSolver for ClarabelLpSolver {
    fn solve(&mut self, lp: &LpProblem) -> DecompResult<LpSolution> {
        let n = lp.num_cols();
        let (a, b, cones, origins) = Self::build_conic(lp)?;

        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());
        let mut solver = DefaultSolver::new(&p, &lp.objective, &a, &b, &cones, self.settings());
        solver.solve();

        let sol = &solver.solution;
        let status = match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => LpStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                LpStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                LpStatus::Unbounded
            }
            _ => LpStatus::NumericalFailure,
        };
        log::trace!(
            "clarabel: {} rows, {} cols, status {:?}, {} iterations",
            lp.num_rows(),
            n,
            sol.status,
            sol.iterations
        );

        if status != LpStatus::Optimal {
            return Ok(LpSolution::with_status(status));
        }

        let mut duals = vec![0.0; lp.num_rows()];
        for (k, origin) in origins.iter().enumerate() {
            match *origin {
                ConicRow::Equality(r) => duals[r] = -sol.z[k],
                ConicRow::Upper(r) => duals[r] -= sol.z[k],
                ConicRow::Lower(r) => duals[r] += sol.z[k],
                ConicRow::Bound => {}
            }
        }

        // A retry with conservative options succeeded; go back to the defaults.
        self.options = self.base_options.clone();

        Ok(LpSolution {
            status,
            primal: sol.x.clone(),
            duals,
            objective: sol.obj_val,
        })
    }

    fn reset(&mut self) {
        log::debug!("clarabel: switching to conservative settings");
        self.options = ClarabelOptions::conservative();
    }

    fn name(&self) -> &str {
        "clarabel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::triplets_to_csc;

    #[test]
    fn test_ranged_lp() {
        // min -x0 - x1  s.t.  x0 + x1 <= 1.5,  0 <= x <= 1
        let lp = LpProblem {
            objective: vec![-1.0, -1.0],
            matrix: triplets_to_csc(1, 2, &[(0, 0, 1.0), (0, 1, 1.0)]),
            row_lb: vec![f64::NEG_INFINITY],
            row_ub: vec![1.5],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![1.0, 1.0],
        };
        let sol = ClarabelLpSolver::default().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.objective + 1.5).abs() < 1e-6);
        // Upper side active: dual is non-positive.
        assert!((sol.duals[0] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_equality_dual_sign() {
        // min 2 x0 + 3 x1  s.t.  x0 + x1 = 1,  x >= 0  ->  x0 = 1, y = 2
        let lp = LpProblem {
            objective: vec![2.0, 3.0],
            matrix: triplets_to_csc(1, 2, &[(0, 0, 1.0), (0, 1, 1.0)]),
            row_lb: vec![1.0],
            row_ub: vec![1.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![f64::INFINITY, f64::INFINITY],
        };
        let sol = ClarabelLpSolver::default().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.primal[0] - 1.0).abs() < 1e-5);
        assert!((sol.duals[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_lower_side_dual_sign() {
        // min x0  s.t.  x0 >= 2
        let lp = LpProblem {
            objective: vec![1.0],
            matrix: triplets_to_csc(1, 1, &[(0, 0, 1.0)]),
            row_lb: vec![2.0],
            row_ub: vec![f64::INFINITY],
            col_lb: vec![f64::NEG_INFINITY],
            col_ub: vec![f64::INFINITY],
        };
        let sol = ClarabelLpSolver::default().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.duals[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_infeasible() {
        // x0 >= 2, x0 <= 1
        let lp = LpProblem {
            objective: vec![1.0],
            matrix: triplets_to_csc(1, 1, &[(0, 0, 1.0)]),
            row_lb: vec![2.0],
            row_ub: vec![f64::INFINITY],
            col_lb: vec![0.0],
            col_ub: vec![1.0],
        };
        let sol = ClarabelLpSolver::default().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Infeasible);
    }

    #[test]
    fn test_shape_mismatch() {
        let lp = LpProblem {
            objective: vec![1.0, 1.0],
            matrix: triplets_to_csc(1, 1, &[(0, 0, 1.0)]),
            row_lb: vec![0.0],
            row_ub: vec![1.0],
            col_lb: vec![0.0, 0.0],
            col_ub: vec![1.0, 1.0],
        };
        assert!(ClarabelLpSolver::default().solve(&lp).is_err());
    }
}

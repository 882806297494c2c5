//! Restricted master problem over generated columns.
//!
//! ```text
//! min  sum_c cost_c lambda_c
//! s.t. lb_r <= sum_c (a_r^T s_c) lambda_c <= ub_r     core, branching and cut rows
//!      sum_{c in k} lambda_c = 1                       one convexity row per block
//!      lambda >= 0
//! ```
//! In the feasibility phase the column costs are zero and artificial columns
//! with unit cost cover every violable row side.

use super::{triplets_to_csc, LpProblem, LpSolver, LpStatus};
use crate::error::{DecompError, DecompResult};
use crate::model::{BlockId, BlockModel, Column, MasterModel, Row};

/// Origin of a master row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Coupling row of the master model.
    Core,

    /// Bound imposed by branching.
    Branch,

    /// Convexity row of a block.
    Convexity(BlockId),

    /// Cut added during the cutting phase.
    Cut,
}

#[derive(Debug, Clone)]
struct MasterRow {
    row: Row,
    kind: RowKind,
}

/// Artificial column covering one side of one row.
#[derive(Debug, Clone, Copy)]
struct Artificial {
    row: usize,
    sign: f64,
}

/// Solution of the restricted master LP.
#[derive(Debug, Clone)]
pub struct MasterSolution {
    /// Objective (artificial sum in the feasibility phase).
    pub objective: f64,

    /// Weight of each column, in column order.
    pub primal: Vec<f64>,

    /// Row duals, in row order.
    pub duals: Vec<f64>,

    /// Sum of artificial values (zero outside the feasibility phase).
    pub artificial_activity: f64,
}

/// The restricted master problem.
///
/// Borrows the LP solver for the lifetime of a node; all row and column
/// changes go through this type.
pub struct RestrictedMaster<'a> {
    /// Original-space objective.
    objective: Vec<f64>,

    rows: Vec<MasterRow>,

    columns: Vec<Column>,

    /// Column weights from the last solve, aligned with `columns`.
    last_primal: Vec<f64>,

    num_blocks: usize,

    /// Row index of the first convexity row.
    convexity_start: usize,

    /// Solve with artificials and zero column costs.
    phase_one: bool,

    lp: &'a mut dyn LpSolver,
}

impl<'a> RestrictedMaster<'a> {
    /// Build the master rows for a node.
    ///
    /// Core rows come first, then one row per branching bound, then one
    /// convexity row per block. Cut rows are appended later.
    pub fn new(master: &MasterModel, blocks: &[BlockModel], lp: &'a mut dyn LpSolver) -> DecompResult<Self> {
        master.validate(blocks)?;

        let mut rows: Vec<MasterRow> = master
            .rows
            .iter()
            .map(|row| MasterRow {
                row: row.clone(),
                kind: RowKind::Core,
            })
            .collect();
        for b in master.branch_bounds() {
            rows.push(MasterRow {
                row: Row::new(vec![(b.var, 1.0)], b.lower, b.upper)
                    .with_name(format!("branch_x{}", b.var)),
                kind: RowKind::Branch,
            });
        }
        let convexity_start = rows.len();
        for block in blocks {
            rows.push(MasterRow {
                row: Row::eq(Vec::new(), 1.0).with_name(format!("conv_{}", block.name)),
                kind: RowKind::Convexity(block.id),
            });
        }

        Ok(Self {
            objective: master.objective.clone(),
            rows,
            columns: Vec::new(),
            last_primal: Vec::new(),
            num_blocks: blocks.len(),
            convexity_start,
            phase_one: false,
            lp,
        })
    }

    /// Number of original variables.
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Number of master rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (artificials excluded).
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Current columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column weights from the last solve.
    pub fn lambda(&self) -> &[f64] {
        &self.last_primal
    }

    /// Kind of a row.
    pub fn row_kind(&self, r: usize) -> RowKind {
        self.rows[r].kind
    }

    /// Row definition over original indices (empty for convexity rows).
    pub fn row(&self, r: usize) -> &Row {
        &self.rows[r].row
    }

    /// Switch between the feasibility phase and the optimization phase.
    pub fn set_phase_one(&mut self, phase_one: bool) {
        self.phase_one = phase_one;
    }

    /// Whether the feasibility phase is active.
    pub fn is_phase_one(&self) -> bool {
        self.phase_one
    }

    /// Add a column unless the same point of the same block is present.
    ///
    /// Returns the column position, or `None` for a duplicate.
    pub fn add_column(&mut self, column: Column) -> DecompResult<Option<usize>> {
        if column.block() >= self.num_blocks {
            return Err(DecompError::InvalidModel(format!(
                "column for unknown block {}",
                column.block()
            )));
        }
        if let Some(j) = column.max_index() {
            if j >= self.num_vars() {
                return Err(DecompError::InvalidModel(format!(
                    "column references variable {} but only {} variables",
                    j,
                    self.num_vars()
                )));
            }
        }
        if self.columns.iter().any(|c| c.same_support(&column)) {
            return Ok(None);
        }
        self.columns.push(column);
        self.last_primal.push(0.0);
        Ok(Some(self.columns.len() - 1))
    }

    /// Append a row over original indices.
    pub fn add_row(&mut self, row: Row, kind: RowKind) -> DecompResult<usize> {
        if matches!(kind, RowKind::Convexity(_)) {
            return Err(DecompError::InvalidModel(
                "convexity rows are created with the master".to_string(),
            ));
        }
        if let Some(j) = row.max_index() {
            if j >= self.num_vars() {
                return Err(DecompError::InvalidModel(format!(
                    "row references variable {} but only {} variables",
                    j,
                    self.num_vars()
                )));
            }
        }
        self.rows.push(MasterRow { row, kind });
        Ok(self.rows.len() - 1)
    }

    /// Remove all rows from `first` on. Only cut rows may be removed.
    pub fn remove_rows_from(&mut self, first: usize) -> DecompResult<usize> {
        if first >= self.rows.len() {
            return Ok(0);
        }
        if self.rows[first..].iter().any(|r| r.kind != RowKind::Cut) {
            return Err(DecompError::InvalidModel(format!(
                "cannot remove non-cut rows starting at {}",
                first
            )));
        }
        let removed = self.rows.len() - first;
        self.rows.truncate(first);
        Ok(removed)
    }

    /// Artificial columns for the feasibility phase.
    fn artificials(&self) -> Vec<Artificial> {
        let mut out = Vec::new();
        for (r, mr) in self.rows.iter().enumerate() {
            if mr.row.lb.is_finite() {
                out.push(Artificial { row: r, sign: 1.0 });
            }
            if mr.row.ub.is_finite() {
                out.push(Artificial { row: r, sign: -1.0 });
            }
        }
        out
    }

    /// Master coefficients of a column: (row, a_r^T s) pairs plus its convexity row.
    fn column_coefficients(&self, column: &Column, by_var: &[Vec<(usize, f64)>]) -> Vec<(usize, f64)> {
        let mut acc: Vec<(usize, f64)> = Vec::new();
        for &(j, v) in column.entries() {
            for &(r, a) in &by_var[j] {
                acc.push((r, a * v));
            }
        }
        acc.sort_by_key(|&(r, _)| r);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(acc.len() + 1);
        for (r, a) in acc {
            match merged.last_mut() {
                Some(last) if last.0 == r => last.1 += a,
                _ => merged.push((r, a)),
            }
        }
        merged.retain(|&(_, a)| a != 0.0);
        merged.push((self.convexity_start + column.block(), 1.0));
        merged
    }

    /// Row coefficients indexed by original variable.
    fn rows_by_var(&self) -> Vec<Vec<(usize, f64)>> {
        let mut by_var = vec![Vec::new(); self.num_vars()];
        for (r, mr) in self.rows.iter().enumerate() {
            for &(j, a) in &mr.row.coefs {
                by_var[j].push((r, a));
            }
        }
        by_var
    }

    /// Assemble the LP for the current phase.
    fn build_lp(&self, artificials: &[Artificial]) -> LpProblem {
        let m = self.rows.len();
        let ncols = self.columns.len() + artificials.len();
        let by_var = self.rows_by_var();

        let mut triplets = Vec::new();
        let mut objective = Vec::with_capacity(ncols);
        for (c, column) in self.columns.iter().enumerate() {
            for (r, a) in self.column_coefficients(column, &by_var) {
                triplets.push((r, c, a));
            }
            objective.push(if self.phase_one { 0.0 } else { column.cost() });
        }
        for (k, art) in artificials.iter().enumerate() {
            triplets.push((art.row, self.columns.len() + k, art.sign));
            objective.push(1.0);
        }

        LpProblem {
            objective,
            matrix: triplets_to_csc(m, ncols, &triplets),
            row_lb: self.rows.iter().map(|r| r.row.lb).collect(),
            row_ub: self.rows.iter().map(|r| r.row.ub).collect(),
            col_lb: vec![0.0; ncols],
            col_ub: vec![f64::INFINITY; ncols],
        }
    }

    /// Solve the restricted master.
    ///
    /// A numerical failure is retried once after resetting the LP solver.
    pub fn solve(&mut self) -> DecompResult<MasterSolution> {
        let artificials = if self.phase_one {
            self.artificials()
        } else {
            Vec::new()
        };
        let lp = self.build_lp(&artificials);

        let mut sol = self.lp.solve(&lp)?;
        if sol.status == LpStatus::NumericalFailure {
            log::warn!(
                "{}: numerical failure on master ({} rows, {} columns), retrying after reset",
                self.lp.name(),
                lp.num_rows(),
                lp.num_cols()
            );
            self.lp.reset();
            sol = self.lp.solve(&lp)?;
        }

        match sol.status {
            LpStatus::Optimal => {}
            LpStatus::Infeasible => {
                return Err(DecompError::MasterInfeasible(format!(
                    "restricted master with {} rows and {} columns",
                    lp.num_rows(),
                    self.columns.len()
                )))
            }
            LpStatus::Unbounded => return Err(DecompError::MasterUnbounded),
            LpStatus::NumericalFailure => {
                return Err(DecompError::MasterNumericalFailure(format!(
                    "{} failed twice",
                    self.lp.name()
                )))
            }
        }
        if sol.primal.len() != lp.num_cols() || sol.duals.len() != lp.num_rows() {
            return Err(DecompError::LpSolver(format!(
                "{} returned {} primal / {} dual values for a {}x{} problem",
                self.lp.name(),
                sol.primal.len(),
                sol.duals.len(),
                lp.num_rows(),
                lp.num_cols()
            )));
        }

        let n = self.columns.len();
        let artificial_activity = sol.primal[n..].iter().map(|v| v.max(0.0)).sum();
        let mut primal = sol.primal;
        primal.truncate(n);
        self.last_primal = primal.clone();

        Ok(MasterSolution {
            objective: sol.objective,
            primal,
            duals: sol.duals,
            artificial_activity,
        })
    }

    /// Update column activity counters from the last solve.
    pub fn update_activity(&mut self, zero_tol: f64) {
        for (column, &value) in self.columns.iter_mut().zip(&self.last_primal) {
            column.record_activity(value, zero_tol);
        }
    }

    /// Drop columns inactive for at least `threshold` rounds.
    ///
    /// Columns whose last value exceeds `zero_tol` are always kept.
    pub fn compress(&mut self, threshold: usize, zero_tol: f64) -> usize {
        let before = self.columns.len();
        let mut keep = Vec::with_capacity(before);
        for (column, &value) in self.columns.iter().zip(&self.last_primal) {
            keep.push(column.inactive_rounds() < threshold || value.abs() > zero_tol);
        }

        let mut it = keep.iter();
        self.columns.retain(|_| *it.next().unwrap_or(&true));
        let mut it = keep.iter();
        self.last_primal.retain(|_| *it.next().unwrap_or(&true));

        before - self.columns.len()
    }

    /// Price vector in original space: `c_j - sum_r pi_r a_rj`.
    ///
    /// Costs are zero in the feasibility phase. Convexity rows do not enter.
    pub fn priced_costs(&self, duals: &[f64]) -> Vec<f64> {
        let mut prices = if self.phase_one {
            vec![0.0; self.num_vars()]
        } else {
            self.objective.clone()
        };
        for (mr, &pi) in self.rows.iter().zip(duals) {
            if pi == 0.0 {
                continue;
            }
            for &(j, a) in &mr.row.coefs {
                prices[j] -= pi * a;
            }
        }
        prices
    }

    /// Dual of the convexity row of `block`.
    pub fn convexity_dual(&self, block: BlockId, duals: &[f64]) -> f64 {
        duals.get(self.convexity_start + block).copied().unwrap_or(0.0)
    }

    /// Recompute cached column reduced costs for a dual vector.
    pub fn refresh_reduced_costs(&mut self, duals: &[f64]) {
        let prices = self.priced_costs(duals);
        let targets: Vec<f64> = (0..self.num_blocks)
            .map(|k| self.convexity_dual(k, duals))
            .collect();
        for column in &mut self.columns {
            let rc = column.price(&prices) - targets[column.block()];
            column.set_reduced_cost(rc);
        }
    }

    /// `sum_r pi_r beta_r`, with `beta_r` the row side the dual sign selects.
    ///
    /// Returns `None` when a dual points at an infinite side.
    pub fn dual_row_term(&self, duals: &[f64]) -> Option<f64> {
        let mut total = 0.0;
        for (mr, &pi) in self.rows.iter().zip(duals) {
            let beta = if pi > 0.0 {
                mr.row.lb
            } else if pi < 0.0 {
                mr.row.ub
            } else {
                continue;
            };
            if !beta.is_finite() {
                return None;
            }
            total += pi * beta;
        }
        Some(total)
    }

    /// Original-space point `x = sum_c lambda_c s_c` from the last solve.
    pub fn original_solution(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.num_vars()];
        for (column, &lambda) in self.columns.iter().zip(&self.last_primal) {
            if lambda != 0.0 {
                column.expand_into(&mut x, lambda);
            }
        }
        x
    }

    /// Objective of the last solution in original costs.
    pub fn original_objective(&self) -> f64 {
        self.columns
            .iter()
            .zip(&self.last_primal)
            .map(|(c, &l)| c.cost() * l)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::LpSolution;

    /// Backend that records the last problem and returns a fixed answer.
    struct ScriptedLp {
        answers: Vec<LpSolution>,
        resets: usize,
    }

    impl LpSolver for ScriptedLp {
        fn solve(&mut self, lp: &LpProblem) -> DecompResult<LpSolution> {
            let mut sol = if self.answers.len() > 1 {
                self.answers.remove(0)
            } else {
                self.answers[0].clone()
            };
            if sol.status == LpStatus::Optimal {
                sol.primal.resize(lp.num_cols(), 0.0);
                sol.duals.resize(lp.num_rows(), 0.0);
            }
            Ok(sol)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn optimal(primal: Vec<f64>, duals: Vec<f64>) -> LpSolution {
        LpSolution {
            status: LpStatus::Optimal,
            primal,
            duals,
            objective: 0.0,
        }
    }

    fn scripted(answers: Vec<LpSolution>) -> ScriptedLp {
        ScriptedLp { answers, resets: 0 }
    }

    fn two_block_master(lp: &mut ScriptedLp) -> RestrictedMaster<'_> {
        // x0 + x2 <= 1, blocks own {0, 1} and {2, 3}
        let mut m = MasterModel::new(vec![1.0, 2.0, 3.0, 4.0]);
        m.add_row(Row::le(vec![(0, 1.0), (2, 1.0)], 1.0)).unwrap();
        let blocks = vec![
            BlockModel::new(0, "a", vec![0, 1]).unwrap(),
            BlockModel::new(1, "b", vec![2, 3]).unwrap(),
        ];
        RestrictedMaster::new(&m, &blocks, lp).unwrap()
    }

    #[test]
    fn test_rows_and_duplicates() {
        let mut lp = scripted(vec![optimal(vec![], vec![])]);
        let mut rm = two_block_master(&mut lp);
        assert_eq!(rm.num_rows(), 3);
        assert_eq!(rm.row_kind(0), RowKind::Core);
        assert_eq!(rm.row_kind(2), RowKind::Convexity(1));

        let col = Column::new(0, vec![(0, 1.0)], 1.0).unwrap();
        assert_eq!(rm.add_column(col.clone()).unwrap(), Some(0));
        assert_eq!(rm.add_column(col).unwrap(), None);
        assert!(rm.add_column(Column::new(5, vec![(0, 1.0)], 1.0).unwrap()).is_err());
        assert!(rm.add_column(Column::new(0, vec![(9, 1.0)], 1.0).unwrap()).is_err());
    }

    #[test]
    fn test_priced_costs_and_targets() {
        let mut lp = scripted(vec![optimal(vec![], vec![])]);
        let rm = two_block_master(&mut lp);
        // pi_core = -0.5, mu_0 = 3, mu_1 = 7
        let duals = [-0.5, 3.0, 7.0];
        let prices = rm.priced_costs(&duals);
        assert_eq!(prices, vec![1.5, 2.0, 3.5, 4.0]);
        assert_eq!(rm.convexity_dual(1, &duals), 7.0);

        // beta: ub = 1 for the core row, 1 for each convexity row.
        assert_eq!(rm.dual_row_term(&duals), Some(-0.5 + 3.0 + 7.0));
        // Positive dual on a row without a lower side.
        assert_eq!(rm.dual_row_term(&[1.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_phase_one_prices_ignore_costs() {
        let mut lp = scripted(vec![optimal(vec![], vec![])]);
        let mut rm = two_block_master(&mut lp);
        rm.set_phase_one(true);
        let prices = rm.priced_costs(&[0.0, 1.0, 1.0]);
        assert!(prices.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_solve_and_original_solution() {
        let mut lp = scripted(vec![optimal(vec![0.25, 0.75, 1.0], vec![0.0, 1.0, 3.0])]);
        let mut rm = two_block_master(&mut lp);
        rm.add_column(Column::new(0, vec![(0, 1.0)], 1.0).unwrap()).unwrap();
        rm.add_column(Column::new(0, vec![(1, 1.0)], 2.0).unwrap()).unwrap();
        rm.add_column(Column::new(1, vec![(3, 2.0)], 8.0).unwrap()).unwrap();

        let sol = rm.solve().unwrap();
        assert_eq!(sol.primal.len(), 3);
        assert_eq!(sol.duals.len(), 3);
        assert_eq!(rm.original_solution(), vec![0.25, 0.75, 0.0, 2.0]);
        assert!((rm.original_objective() - (0.25 + 1.5 + 8.0)).abs() < 1e-12);

        rm.refresh_reduced_costs(&sol.duals);
        assert!((rm.columns()[0].reduced_cost() - 0.0).abs() < 1e-12);
        assert!((rm.columns()[2].reduced_cost() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_compression_keeps_active_columns() {
        let mut lp = scripted(vec![optimal(vec![0.0, 1.0], vec![])]);
        let mut rm = two_block_master(&mut lp);
        rm.add_column(Column::new(0, vec![(0, 1.0)], 1.0).unwrap()).unwrap();
        rm.add_column(Column::new(1, vec![(2, 1.0)], 1.0).unwrap()).unwrap();

        for _ in 0..3 {
            rm.solve().unwrap();
            rm.update_activity(1e-9);
        }
        assert_eq!(rm.columns()[0].inactive_rounds(), 3);
        assert_eq!(rm.compress(3, 1e-9), 1);
        assert_eq!(rm.num_columns(), 1);
        assert_eq!(rm.columns()[0].block(), 1);
        assert_eq!(rm.lambda(), &[1.0]);
    }

    #[test]
    fn test_numerical_failure_retries_once() {
        let answers = vec![
            LpSolution::with_status(LpStatus::NumericalFailure),
            optimal(vec![], vec![]),
        ];
        let mut lp = scripted(answers);
        let mut rm = two_block_master(&mut lp);
        assert!(rm.solve().is_ok());
        assert_eq!(lp.resets, 1);

        let mut lp = scripted(vec![LpSolution::with_status(LpStatus::NumericalFailure)]);
        let mut rm = two_block_master(&mut lp);
        assert!(matches!(rm.solve(), Err(DecompError::MasterNumericalFailure(_))));

        let mut lp = scripted(vec![LpSolution::with_status(LpStatus::Infeasible)]);
        let mut rm = two_block_master(&mut lp);
        assert!(matches!(rm.solve(), Err(DecompError::MasterInfeasible(_))));
    }

    #[test]
    fn test_cut_rows_roll_back() {
        let mut lp = scripted(vec![optimal(vec![], vec![])]);
        let mut rm = two_block_master(&mut lp);
        let first = rm.num_rows();
        rm.add_row(Row::le(vec![(1, 1.0)], 0.5), RowKind::Cut).unwrap();
        rm.add_row(Row::le(vec![(3, 1.0)], 0.5), RowKind::Cut).unwrap();
        assert_eq!(rm.remove_rows_from(first).unwrap(), 2);
        assert_eq!(rm.num_rows(), first);

        // Core rows are permanent.
        assert!(rm.remove_rows_from(0).is_err());
        assert!(rm.add_row(Row::eq(vec![], 1.0), RowKind::Convexity(0)).is_err());
    }

    #[test]
    fn test_artificials_cover_violable_sides() {
        let mut lp = scripted(vec![optimal(vec![], vec![])]);
        let mut rm = two_block_master(&mut lp);
        rm.set_phase_one(true);
        let arts = rm.artificials();
        // core row `<= 1` gets one; each convexity row gets +1 and -1.
        assert_eq!(arts.len(), 5);
        assert_eq!(arts[0].row, 0);
        assert_eq!(arts[0].sign, -1.0);
    }
}

//! Master (coupling) model in original space.

use super::{BlockModel, Row};
use crate::error::{DecompError, DecompResult};

/// Bound imposed on an original variable by the embedding tree search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarBound {
    /// Variable index.
    pub var: usize,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Coupling constraints and objective over the original variables.
///
/// Treated as immutable input by the engine. The tree search adds branching
/// decisions through [`MasterModel::tighten_bound`], which become master rows.
#[derive(Debug, Clone)]
pub struct MasterModel {
    /// Original-space objective coefficients (length n).
    pub objective: Vec<f64>,

    /// Coupling rows over original indices.
    pub rows: Vec<Row>,

    /// Indices of integer variables.
    pub integer_vars: Vec<usize>,

    /// Original variable lower bounds.
    pub var_lb: Vec<f64>,

    /// Original variable upper bounds.
    pub var_ub: Vec<f64>,

    /// Bounds tightened by branching, enforced as master rows.
    branch_bounds: Vec<VarBound>,
}

impl MasterModel {
    /// Create a master over `objective.len()` continuous, unbounded variables.
    pub fn new(objective: Vec<f64>) -> Self {
        let n = objective.len();
        Self {
            objective,
            rows: Vec::new(),
            integer_vars: Vec::new(),
            var_lb: vec![f64::NEG_INFINITY; n],
            var_ub: vec![f64::INFINITY; n],
            branch_bounds: Vec::new(),
        }
    }

    /// Number of original variables.
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Number of coupling rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Append a coupling row.
    pub fn add_row(&mut self, row: Row) -> DecompResult<usize> {
        if let Some(j) = row.max_index() {
            if j >= self.num_vars() {
                return Err(DecompError::InvalidModel(format!(
                    "master row references variable {} but only {} variables",
                    j,
                    self.num_vars()
                )));
            }
        }
        if row.lb > row.ub {
            return Err(DecompError::InvalidModel(format!(
                "master row {} has lb {} > ub {}",
                row.label(self.rows.len()),
                row.lb,
                row.ub
            )));
        }
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    /// Declare variables integer.
    pub fn set_integer(&mut self, vars: impl IntoIterator<Item = usize>) {
        self.integer_vars.extend(vars);
        self.integer_vars.sort_unstable();
        self.integer_vars.dedup();
    }

    /// Set original bounds on a variable.
    pub fn set_var_bounds(&mut self, var: usize, lb: f64, ub: f64) {
        if var < self.num_vars() {
            self.var_lb[var] = lb;
            self.var_ub[var] = ub;
        }
    }

    /// Impose a branching bound `lb <= x_var <= ub`.
    ///
    /// Intersects with any bound already imposed on the same variable.
    pub fn tighten_bound(&mut self, var: usize, lb: f64, ub: f64) -> DecompResult<()> {
        if var >= self.num_vars() {
            return Err(DecompError::InvalidModel(format!(
                "branching on variable {} but only {} variables",
                var,
                self.num_vars()
            )));
        }
        if let Some(existing) = self.branch_bounds.iter_mut().find(|b| b.var == var) {
            existing.lower = existing.lower.max(lb);
            existing.upper = existing.upper.min(ub);
        } else {
            self.branch_bounds.push(VarBound {
                var,
                lower: lb,
                upper: ub,
            });
        }
        self.var_lb[var] = self.var_lb[var].max(lb);
        self.var_ub[var] = self.var_ub[var].min(ub);
        Ok(())
    }

    /// Bounds imposed by branching.
    pub fn branch_bounds(&self) -> &[VarBound] {
        &self.branch_bounds
    }

    /// Objective value of an original-space point.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// Check if a solution is integer-feasible within tolerance.
    pub fn is_integer_feasible(&self, x: &[f64], tol: f64) -> bool {
        self.integer_vars
            .iter()
            .all(|&i| (x[i] - x[i].round()).abs() <= tol)
    }

    /// Get the fractionality of a value (distance to nearest integer).
    pub fn fractionality(&self, val: f64) -> f64 {
        let frac = val.fract().abs();
        frac.min(1.0 - frac)
    }

    /// Get fractional integer variables and their values.
    ///
    /// Returns (var_index, current_value, fractionality) for each fractional variable.
    pub fn get_fractional_vars(&self, x: &[f64], tol: f64) -> Vec<(usize, f64, f64)> {
        let mut result = Vec::new();
        for &i in &self.integer_vars {
            let val = x[i];
            let frac = self.fractionality(val);
            if frac > tol {
                result.push((i, val, frac));
            }
        }
        result
    }

    /// Validate this master against its blocks.
    ///
    /// Blocks must be numbered by position, reference existing variables and
    /// own disjoint sets of master indices.
    pub fn validate(&self, blocks: &[BlockModel]) -> DecompResult<()> {
        if blocks.is_empty() {
            return Err(DecompError::InvalidModel("no blocks given".to_string()));
        }
        let n = self.num_vars();
        if self.var_lb.len() != n || self.var_ub.len() != n {
            return Err(DecompError::InvalidModel(
                "bound vectors do not match the number of variables".to_string(),
            ));
        }
        if let Some(&i) = self.integer_vars.iter().find(|&&i| i >= n) {
            return Err(DecompError::InvalidModel(format!(
                "integer variable {} out of range ({} variables)",
                i, n
            )));
        }
        if let Some(b) = self.branch_bounds.iter().find(|b| b.lower > b.upper + 1e-9) {
            return Err(DecompError::MasterInfeasible(format!(
                "branching bounds on variable {} are empty: [{}, {}]",
                b.var, b.lower, b.upper
            )));
        }

        let mut owner: Vec<Option<usize>> = vec![None; n];
        for (pos, block) in blocks.iter().enumerate() {
            if block.id != pos {
                return Err(DecompError::InvalidModel(format!(
                    "block at position {} has id {}",
                    pos, block.id
                )));
            }
            for &m in block.active_columns() {
                if m >= n {
                    return Err(DecompError::InvalidModel(format!(
                        "block {} maps to variable {} but only {} variables",
                        block.id, m, n
                    )));
                }
                if let Some(other) = owner[m] {
                    return Err(DecompError::InvalidModel(format!(
                        "variable {} claimed by blocks {} and {}",
                        m, other, block.id
                    )));
                }
                owner[m] = Some(block.id);
            }
        }
        Ok(())
    }
}

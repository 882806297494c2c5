//! Block (subproblem) constraint systems.

use std::collections::HashMap;

use super::{BlockId, Column, Row};
use crate::error::{DecompError, DecompResult};

/// Constraint system of one decomposable block, in block-local indices.
///
/// `active_columns[local]` gives the master index of each local variable.
/// The mapping is fixed for the lifetime of the model.
#[derive(Debug, Clone)]
pub struct BlockModel {
    /// Block identifier (its position in the block list).
    pub id: BlockId,

    /// Human-readable name.
    pub name: String,

    /// Block rows over local indices.
    rows: Vec<Row>,

    /// Local lower bounds.
    col_lb: Vec<f64>,

    /// Local upper bounds.
    col_ub: Vec<f64>,

    /// Local index -> master index.
    active_columns: Vec<usize>,

    /// Master index -> local index.
    local_of: HashMap<usize, usize>,
}

impl BlockModel {
    /// Create a block with default bounds [0, +inf) on every local variable.
    ///
    /// Fails if two local indices map to the same master index.
    pub fn new(id: BlockId, name: impl Into<String>, active_columns: Vec<usize>) -> DecompResult<Self> {
        let mut local_of = HashMap::with_capacity(active_columns.len());
        for (local, &master) in active_columns.iter().enumerate() {
            if local_of.insert(master, local).is_some() {
                return Err(DecompError::InvalidModel(format!(
                    "block {}: master index {} mapped twice",
                    id, master
                )));
            }
        }

        let n = active_columns.len();
        Ok(Self {
            id,
            name: name.into(),
            rows: Vec::new(),
            col_lb: vec![0.0; n],
            col_ub: vec![f64::INFINITY; n],
            active_columns,
            local_of,
        })
    }

    /// Append a row over local indices.
    pub fn push_row(&mut self, row: Row) -> DecompResult<()> {
        if let Some(j) = row.max_index() {
            if j >= self.num_cols() {
                return Err(DecompError::InvalidModel(format!(
                    "block {}: row references local index {} but block has {} columns",
                    self.id,
                    j,
                    self.num_cols()
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Set bounds on a local variable.
    pub fn set_col_bounds(&mut self, local: usize, lb: f64, ub: f64) -> DecompResult<()> {
        if local >= self.num_cols() || lb > ub {
            return Err(DecompError::InvalidModel(format!(
                "block {}: invalid bounds [{}, {}] for local column {}",
                self.id, lb, ub, local
            )));
        }
        self.col_lb[local] = lb;
        self.col_ub[local] = ub;
        Ok(())
    }

    /// Number of local variables.
    pub fn num_cols(&self) -> usize {
        self.active_columns.len()
    }

    /// Block rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Local lower bounds.
    pub fn col_lb(&self) -> &[f64] {
        &self.col_lb
    }

    /// Local upper bounds.
    pub fn col_ub(&self) -> &[f64] {
        &self.col_ub
    }

    /// Local -> master mapping.
    pub fn active_columns(&self) -> &[usize] {
        &self.active_columns
    }

    /// Master index of a local variable.
    pub fn to_master(&self, local: usize) -> usize {
        self.active_columns[local]
    }

    /// Local index of a master variable, if this block owns it.
    pub fn local_index(&self, master: usize) -> Option<usize> {
        self.local_of.get(&master).copied()
    }

    /// Translate local (index, value) pairs to master indices.
    pub fn translate(&self, local: &[(usize, f64)]) -> DecompResult<Vec<(usize, f64)>> {
        local
            .iter()
            .map(|&(l, v)| {
                self.active_columns
                    .get(l)
                    .map(|&m| (m, v))
                    .ok_or_else(|| {
                        DecompError::InvalidModel(format!(
                            "block {}: local index {} out of range",
                            self.id, l
                        ))
                    })
            })
            .collect()
    }

    /// Build a column from a local point.
    pub fn column_from_local(&self, local: &[(usize, f64)], cost: f64) -> DecompResult<Column> {
        Column::new(self.id, self.translate(local)?, cost)
    }

    /// Check whether a column is a feasible point of this block.
    pub fn contains(&self, column: &Column, tol: f64) -> bool {
        if column.block() != self.id {
            return false;
        }
        let mut x = vec![0.0; self.num_cols()];
        for &(m, v) in column.entries() {
            match self.local_index(m) {
                Some(l) => x[l] = v,
                None => return false,
            }
        }
        let bounds_ok = x
            .iter()
            .zip(self.col_lb.iter().zip(&self.col_ub))
            .all(|(&v, (&lb, &ub))| v >= lb - tol && v <= ub + tol);
        bounds_ok && self.rows.iter().all(|r| !r.is_violated(&x, tol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_block() -> BlockModel {
        // Two arcs 0->1 and 1->2, flow conservation on 3 nodes.
        let mut block = BlockModel::new(1, "comm1", vec![10, 11]).unwrap();
        block.push_row(Row::eq(vec![(0, -1.0)], -1.0)).unwrap();
        block.push_row(Row::eq(vec![(0, 1.0), (1, -1.0)], 0.0)).unwrap();
        block.push_row(Row::eq(vec![(1, 1.0)], 1.0)).unwrap();
        block.set_col_bounds(0, 0.0, 1.0).unwrap();
        block.set_col_bounds(1, 0.0, 1.0).unwrap();
        block
    }

    #[test]
    fn test_mapping() {
        let block = path_block();
        assert_eq!(block.num_cols(), 2);
        assert_eq!(block.to_master(1), 11);
        assert_eq!(block.local_index(10), Some(0));
        assert_eq!(block.local_index(3), None);
        assert_eq!(block.translate(&[(1, 1.0), (0, 2.0)]).unwrap(), vec![(11, 1.0), (10, 2.0)]);
        assert!(block.translate(&[(5, 1.0)]).is_err());
    }

    #[test]
    fn test_rejects_non_injective_mapping() {
        assert!(BlockModel::new(0, "bad", vec![1, 2, 1]).is_err());
    }

    #[test]
    fn test_rows_use_local_indices() {
        let mut block = BlockModel::new(0, "b", vec![4, 5]).unwrap();
        assert!(block.push_row(Row::le(vec![(2, 1.0)], 1.0)).is_err());
        assert!(block.set_col_bounds(0, 2.0, 1.0).is_err());
    }

    #[test]
    fn test_contains() {
        let block = path_block();
        let path = block.column_from_local(&[(0, 1.0), (1, 1.0)], 2.0).unwrap();
        assert!(block.contains(&path, 1e-9));

        let half = block.column_from_local(&[(0, 1.0)], 1.0).unwrap();
        assert!(!block.contains(&half, 1e-9));

        let other = Column::new(0, vec![(10, 1.0), (11, 1.0)], 2.0).unwrap();
        assert!(!block.contains(&other, 1e-9));
    }
}

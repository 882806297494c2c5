//! Columns generated by block pricing oracles.

use crate::error::{DecompError, DecompResult};

/// Identifier of a block (position in the block list).
pub type BlockId = usize;

/// A sparse contribution of one block to the master problem.
///
/// Entries are expressed in master (original-space) indices. Once accepted by
/// the restricted master only the cached reduced cost and the activity counter
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// (master index, coefficient), sorted by index, unique.
    entries: Vec<(usize, f64)>,

    /// Original-space cost c^T s.
    cost: f64,

    /// Master reduced cost from the most recent pricing pass.
    reduced_cost: f64,

    /// Owning block.
    block: BlockId,

    /// Consecutive master solves in which the column had zero value.
    inactive_rounds: usize,
}

impl Column {
    /// Create a column.
    ///
    /// Entries may be given in any order but indices must be unique and all
    /// values finite.
    pub fn new(block: BlockId, mut entries: Vec<(usize, f64)>, cost: f64) -> DecompResult<Self> {
        entries.sort_by_key(|&(j, _)| j);

        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DecompError::InvalidModel(format!(
                "column for block {} repeats master index {}",
                block, w[0].0
            )));
        }
        if !cost.is_finite() || entries.iter().any(|&(_, v)| !v.is_finite()) {
            return Err(DecompError::InvalidModel(format!(
                "column for block {} has non-finite data",
                block
            )));
        }

        Ok(Self {
            entries,
            cost,
            reduced_cost: 0.0,
            block,
            inactive_rounds: 0,
        })
    }

    /// Set the reduced cost reported by the oracle.
    pub fn with_reduced_cost(mut self, reduced_cost: f64) -> Self {
        self.reduced_cost = reduced_cost;
        self
    }

    /// Sparse entries.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Original-space cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Cached reduced cost.
    pub fn reduced_cost(&self) -> f64 {
        self.reduced_cost
    }

    /// Owning block.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Consecutive rounds at zero value.
    pub fn inactive_rounds(&self) -> usize {
        self.inactive_rounds
    }

    /// Number of nonzero entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the column has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Price of the column under an original-space price vector.
    pub fn price(&self, prices: &[f64]) -> f64 {
        self.entries.iter().map(|&(j, v)| prices[j] * v).sum()
    }

    /// Whether two columns describe the same point of the same block.
    pub fn same_support(&self, other: &Column) -> bool {
        self.block == other.block
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.0 == b.0 && (a.1 - b.1).abs() <= 1e-12)
    }

    /// Accumulate `weight * entries` into an original-space vector.
    pub fn expand_into(&self, x: &mut [f64], weight: f64) {
        for &(j, v) in &self.entries {
            x[j] += weight * v;
        }
    }

    /// Largest referenced master index.
    pub fn max_index(&self) -> Option<usize> {
        self.entries.last().map(|&(j, _)| j)
    }

    pub(crate) fn set_reduced_cost(&mut self, reduced_cost: f64) {
        self.reduced_cost = reduced_cost;
    }

    /// Update the activity counter from the latest primal value.
    pub(crate) fn record_activity(&mut self, value: f64, zero_tol: f64) {
        if value.abs() > zero_tol {
            self.inactive_rounds = 0;
        } else {
            self.inactive_rounds += 1;
        }
    }
}

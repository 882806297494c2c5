//! Cut generation interface and the cross-node cut pool.

mod pool;

pub use pool::{CutPool, CutPoolSettings, CutPoolStats, CutStatus, PooledCut};

use crate::model::Row;

/// Produces valid inequalities separating a fractional original-space point.
///
/// Cuts are rows over original indices. Deriving them is the generator's job;
/// the engine only pools, filters and adds them.
pub trait CutGenerator: Send {
    /// Generate cuts for `x`. Cuts that `x` satisfies are discarded later.
    fn generate_cuts(&mut self, x: &[f64]) -> Vec<Row>;

    /// Generator name for logging.
    fn name(&self) -> &str {
        "cuts"
    }
}

//! Block pricing protocol.

use crate::error::DecompResult;
use crate::model::{BlockModel, Column};

/// What a pricing call is asked to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricingTarget {
    /// Find columns whose price is below this value (the block's convexity dual).
    Improve(f64),

    /// Produce starting columns with the original costs as prices.
    ///
    /// Oracles that cannot handle negative prices may return no column.
    InitialColumns,
}

impl PricingTarget {
    /// Target value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            PricingTarget::Improve(t) => Some(*t),
            PricingTarget::InitialColumns => None,
        }
    }
}

/// Outcome of one pricing call.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingResult {
    /// The block was solved. `columns` may be empty.
    Optimal {
        /// Generated columns, reduced costs set relative to the target.
        columns: Vec<Column>,

        /// Best master reduced cost found by an exact search, if known.
        best_reduced_cost: Option<f64>,
    },

    /// The block has no feasible point.
    Infeasible,
}

impl PricingResult {
    /// `Optimal` with no column.
    pub fn no_column() -> Self {
        PricingResult::Optimal {
            columns: Vec::new(),
            best_reduced_cost: None,
        }
    }

    /// Generated columns (empty when infeasible).
    pub fn columns(&self) -> &[Column] {
        match self {
            PricingResult::Optimal { columns, .. } => columns,
            PricingResult::Infeasible => &[],
        }
    }
}

/// Solves a block subproblem for a given price vector.
///
/// `prices` is indexed by master (original-space) variable; the oracle reads
/// its own entries through `block.active_columns()`. Calls must be free of
/// side effects so that blocks can be priced concurrently and repeated calls
/// with the same input return the same result.
pub trait PricingOracle: Send + Sync {
    /// Price one block.
    fn price(&self, block: &BlockModel, prices: &[f64], target: PricingTarget) -> DecompResult<PricingResult>;

    /// Whether `best_reduced_cost` is a true minimum (needed for valid bounds).
    fn is_exact(&self) -> bool {
        true
    }

    /// Oracle name for logging.
    fn name(&self) -> &str {
        "oracle"
    }
}

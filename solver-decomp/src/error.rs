//! Error types for the decomposition engine.

use thiserror::Error;

use crate::model::BlockId;

/// Errors that can occur while processing a node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompError {
    /// Restricted master LP is infeasible (node can be pruned).
    #[error("Master infeasible: {0}")]
    MasterInfeasible(String),

    /// Restricted master LP is unbounded (missing column bound or modeling error).
    #[error("Master unbounded")]
    MasterUnbounded,

    /// LP solver failed numerically, even after a reset.
    #[error("Master numerical failure: {0}")]
    MasterNumericalFailure(String),

    /// A block subproblem has no feasible solution.
    #[error("Block {block} subproblem infeasible")]
    BlockInfeasible {
        /// Offending block.
        block: BlockId,
    },

    /// Block prices contain a negative cycle reachable from the source.
    #[error("Block {block} prices contain a negative cycle")]
    NegativeCycle {
        /// Offending block.
        block: BlockId,
    },

    /// A block oracle exceeded the round time budget.
    #[error("Block {block} pricing exceeded the time budget")]
    OracleTimeout {
        /// Offending block.
        block: BlockId,
    },

    /// Invalid parameter combination.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Malformed master/block model or column.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Error reported by the LP solver backend itself.
    #[error("LP solver error: {0}")]
    LpSolver(String),
}

impl DecompError {
    /// Whether this error ends processing of the current node.
    ///
    /// The embedding tree search decides whether to prune the node or retry
    /// it with different settings; the engine never aborts the whole solve.
    pub fn is_node_failure(&self) -> bool {
        matches!(
            self,
            DecompError::MasterInfeasible(_)
                | DecompError::MasterUnbounded
                | DecompError::MasterNumericalFailure(_)
                | DecompError::BlockInfeasible { .. }
                | DecompError::NegativeCycle { .. }
        )
    }

    /// Whether the node is proven infeasible (safe to prune).
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            DecompError::MasterInfeasible(_) | DecompError::BlockInfeasible { .. }
        )
    }
}

/// Result type for decomposition operations.
pub type DecompResult<T> = Result<T, DecompError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_failure_classification() {
        assert!(DecompError::MasterUnbounded.is_node_failure());
        assert!(DecompError::BlockInfeasible { block: 2 }.is_node_failure());
        assert!(DecompError::NegativeCycle { block: 1 }.is_node_failure());
        assert!(!DecompError::NegativeCycle { block: 1 }.is_infeasible());
        assert!(!DecompError::OracleTimeout { block: 0 }.is_node_failure());
        assert!(!DecompError::ConfigurationError("alpha".into()).is_node_failure());

        assert!(DecompError::MasterInfeasible("phase one".into()).is_infeasible());
        assert!(!DecompError::MasterUnbounded.is_infeasible());
    }

    #[test]
    fn test_display() {
        let err = DecompError::BlockInfeasible { block: 3 };
        assert_eq!(err.to_string(), "Block 3 subproblem infeasible");
    }
}

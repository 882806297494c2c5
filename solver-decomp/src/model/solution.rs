//! Node results and statistics.

use super::{Column, Row};

/// How column generation ended at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// No improving column or cut remains: bound is final for this node.
    Optimal,

    /// Master objective and Lagrangian bound met within `gap_tol`.
    GapClosed,

    /// `max_pricing_rounds` reached before convergence.
    RoundLimit,

    /// Cancelled by the caller at a round boundary.
    Cancelled,

    /// A pricing-round hook asked to stop.
    Stopped,

    /// A round found no column while some block ran out of its time budget,
    /// so neither convergence nor infeasibility is proven.
    TimedOut,
}

impl NodeStatus {
    /// Returns true if the node bound is proven (no improving column left).
    pub fn is_converged(&self) -> bool {
        matches!(self, NodeStatus::Optimal | NodeStatus::GapClosed)
    }
}

/// Counters accumulated over a node's lifetime.
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    /// Total pricing calls (one per round, including mispricing re-prices).
    pub price_calls_total: u64,

    /// Total cut-generation calls.
    pub cut_calls_total: u64,

    /// Master LP solves.
    pub master_solves: u64,

    /// Columns accepted into the master.
    pub columns_generated: u64,

    /// Columns compressed out.
    pub columns_compressed: u64,

    /// Cut rows added to the master.
    pub cuts_added: u64,

    /// Cut batches rolled back after master infeasibility.
    pub cut_rollbacks: u64,

    /// Rounds where smoothed duals produced no new column.
    pub mispricings: u64,

    /// Blocks that exceeded the round time budget.
    pub oracle_timeouts: u64,

    /// Best Lagrangian bound after each pricing round (non-decreasing).
    pub bound_history: Vec<f64>,

    /// Restricted master objective after each solve.
    pub objective_history: Vec<f64>,

    /// Wall-clock time spent at this node in milliseconds.
    pub solve_time_ms: u64,
}

impl NodeStats {
    /// Total pricing + cut calls so far.
    pub fn total_calls(&self) -> u64 {
        self.price_calls_total + self.cut_calls_total
    }
}

/// Result of processing one branch-and-bound node.
#[derive(Debug, Clone)]
pub struct NodeSolution {
    /// Termination status.
    pub status: NodeStatus,

    /// Best Lagrangian (lower) bound on the node optimum.
    pub bound: f64,

    /// Final restricted master objective.
    pub objective: f64,

    /// Fractional solution in original space.
    pub x: Vec<f64>,

    /// Master weight of each column in `columns`.
    pub lambda: Vec<f64>,

    /// Final master columns (warm start for child nodes).
    pub columns: Vec<Column>,

    /// Cuts generated at this node.
    pub generated_cuts: Vec<Row>,

    /// Whether `x` is integral and accepted by the feasibility hook.
    pub integral: bool,

    /// Node statistics.
    pub stats: NodeStats,
}

impl NodeSolution {
    /// Relative gap between master objective and bound.
    pub fn gap(&self) -> f64 {
        compute_gap(self.objective, self.bound)
    }
}

/// Compute relative gap.
pub fn compute_gap(primal: f64, dual: f64) -> f64 {
    if primal.is_infinite() || dual.is_infinite() {
        return f64::INFINITY;
    }
    let denom = primal.abs().max(1.0);
    (primal - dual).max(0.0) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_computation() {
        // Gap = |10 - 8| / |10| = 0.2
        assert!((compute_gap(10.0, 8.0) - 0.2).abs() < 1e-10);

        // Small objectives use an absolute gap
        assert!((compute_gap(0.5, 0.25) - 0.25).abs() < 1e-10);

        assert_eq!(compute_gap(10.0, f64::NEG_INFINITY), f64::INFINITY);
        assert_eq!(compute_gap(5.0, 5.5), 0.0);
    }

    #[test]
    fn test_status_methods() {
        assert!(NodeStatus::Optimal.is_converged());
        assert!(NodeStatus::GapClosed.is_converged());
        assert!(!NodeStatus::RoundLimit.is_converged());
        assert!(!NodeStatus::Cancelled.is_converged());
        assert!(!NodeStatus::TimedOut.is_converged());
    }

    #[test]
    fn test_total_calls() {
        let stats = NodeStats {
            price_calls_total: 3,
            cut_calls_total: 2,
            ..Default::default()
        };
        assert_eq!(stats.total_calls(), 5);
    }
}

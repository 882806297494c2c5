//! Typed extension points called by the node loop.

use super::Phase;
use crate::model::{BlockModel, Column};

/// Whether the loop should go on after a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundControl {
    /// Keep going.
    Continue,

    /// Stop the current phase.
    Stop,
}

/// Summary of a finished pricing round.
#[derive(Debug, Clone)]
pub struct PricingRound<'a> {
    /// Round number within the node (1-based).
    pub round: usize,

    /// `Feasibility` or `Pricing`.
    pub phase: Phase,

    /// Master objective of the round.
    pub master_objective: f64,

    /// Lagrangian bound of the round, if it could be computed.
    pub bound: Option<f64>,

    /// Best bound of the node so far.
    pub best_bound: f64,

    /// Columns added to the master.
    pub columns_added: usize,

    /// Whether the smoothed duals failed and the round re-priced with raw duals.
    pub mispriced: bool,

    /// Raw master duals.
    pub duals: &'a [f64],
}

/// Summary of a finished cutting round.
#[derive(Debug, Clone)]
pub struct CutRound<'a> {
    /// Cutting round number within the node (1-based).
    pub round: usize,

    /// Fractional point the cuts were separated from.
    pub x: &'a [f64],

    /// Cut rows added to the master.
    pub cuts_added: usize,
}

/// Callbacks for one lifecycle event each. All methods default to no-ops.
pub trait NodeHooks: Send {
    /// Extra starting columns, added after the warm start.
    fn on_initial_columns(&mut self, _blocks: &[BlockModel]) -> Vec<Column> {
        Vec::new()
    }

    /// Accept or reject an integral master solution.
    fn on_feasible_solution(&mut self, _x: &[f64]) -> bool {
        true
    }

    /// Called after every pricing round.
    fn on_pricing_round(&mut self, _round: &PricingRound<'_>) -> RoundControl {
        RoundControl::Continue
    }

    /// Called after every cutting round.
    fn on_cut_round(&mut self, _round: &CutRound<'_>) -> RoundControl {
        RoundControl::Continue
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl NodeHooks for NoHooks {}

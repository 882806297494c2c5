//! Node-level price-and-cut engine.

mod context;
mod hooks;
mod node;
mod phase;

pub use context::SolverContext;
pub use hooks::{CutRound, NoHooks, NodeHooks, PricingRound, RoundControl};
pub use node::solve_node;
pub use phase::Phase;

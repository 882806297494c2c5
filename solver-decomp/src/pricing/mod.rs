//! Pricing protocol, the shortest-path oracle and round execution.

mod oracle;
mod round;
mod shortest_path;

pub use oracle::{PricingOracle, PricingResult, PricingTarget};
pub use round::{price_round, BlockOutcome, BlockPricing, OracleSet};
pub use shortest_path::{PathArc, PathBlock, ShortestPathOracle, PRICE_SCALE};

//! Columns, constraint systems and node results.

mod block;
mod column;
mod problem;
mod row;
mod solution;

pub use block::BlockModel;
pub use column::{BlockId, Column};
pub use problem::{MasterModel, VarBound};
pub use row::Row;
pub use solution::{compute_gap, NodeSolution, NodeStats, NodeStatus};

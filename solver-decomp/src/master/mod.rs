//! Restricted master problem and LP solver backends.

mod backend;
mod clarabel_backend;
mod restricted;

pub use backend::{triplets_to_csc, LpProblem, LpSolution, LpSolver, LpStatus};
pub use clarabel_backend::{ClarabelLpSolver, ClarabelOptions};
pub use restricted::{MasterSolution, RestrictedMaster, RowKind};

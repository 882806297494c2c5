//! Price-and-cut column generation for decomposable mixed-integer programs.
//!
//! A problem is split into coupling rows over the original variables (the
//! master) and independent blocks whose feasible points enter the master as
//! columns. For one node of a tree search the engine:
//!
//! - solves the restricted master LP (through an [`LpSolver`], Clarabel by default),
//! - smooths the master duals (Wentges),
//! - asks a [`PricingOracle`] per block for columns of negative reduced cost,
//! - tracks the Lagrangian bound and stops when no improving column remains,
//! - optionally separates cuts in original space and repeats.
//!
//! # Example
//!
//! ```ignore
//! use solver_decomp::{
//!     mcf::McfInstance, solve_node, ClarabelLpSolver, DecompSettings, OracleSet, SolverContext,
//! };
//!
//! let models = McfInstance::small().build()?;
//! let oracles = OracleSet::shared(Box::new(models.oracle));
//! let mut ctx = SolverContext::new(
//!     DecompSettings::default(),
//!     Box::new(ClarabelLpSolver::default()),
//!     oracles,
//! )?;
//! let node = solve_node(&mut ctx, &models.master, &models.blocks, Vec::new())?;
//! println!("{:?}: bound {} objective {}", node.status, node.bound, node.objective);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cuts;
pub mod engine;
pub mod error;
pub mod master;
pub mod mcf;
pub mod model;
pub mod pricing;
pub mod settings;
pub mod stabilization;

pub use cuts::{CutGenerator, CutPool, CutPoolSettings};
pub use engine::{solve_node, CutRound, NoHooks, NodeHooks, Phase, PricingRound, RoundControl, SolverContext};
pub use error::{DecompError, DecompResult};
pub use master::{ClarabelLpSolver, ClarabelOptions, LpProblem, LpSolution, LpSolver, LpStatus, RestrictedMaster};
pub use model::{BlockId, BlockModel, Column, MasterModel, NodeSolution, NodeStats, NodeStatus, Row};
pub use pricing::{OracleSet, PricingOracle, PricingResult, PricingTarget, ShortestPathOracle};
pub use settings::DecompSettings;
pub use stabilization::DualStabilizer;

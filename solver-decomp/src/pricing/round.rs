//! One pricing round: every block priced against the same dual vector.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{PricingOracle, PricingResult, PricingTarget};
use crate::error::{DecompError, DecompResult};
use crate::model::{BlockId, BlockModel, Column};
use crate::settings::DecompSettings;

/// Oracles by block, with an optional fallback shared by all other blocks.
#[derive(Default)]
pub struct OracleSet {
    default: Option<Box<dyn PricingOracle>>,
    per_block: HashMap<BlockId, Box<dyn PricingOracle>>,
}

impl OracleSet {
    /// One oracle for every block.
    pub fn shared(oracle: Box<dyn PricingOracle>) -> Self {
        Self {
            default: Some(oracle),
            per_block: HashMap::new(),
        }
    }

    /// Register an oracle for one block, overriding the shared one.
    pub fn with_block(mut self, block: BlockId, oracle: Box<dyn PricingOracle>) -> Self {
        self.per_block.insert(block, oracle);
        self
    }

    /// Oracle responsible for `block`.
    pub fn for_block(&self, block: BlockId) -> Option<&dyn PricingOracle> {
        self.per_block
            .get(&block)
            .or(self.default.as_ref())
            .map(|o| o.as_ref())
    }

    /// Check that every block has an oracle.
    pub fn validate(&self, blocks: &[BlockModel]) -> DecompResult<()> {
        match blocks.iter().find(|b| self.for_block(b.id).is_none()) {
            Some(b) => Err(DecompError::ConfigurationError(format!(
                "no pricing oracle for block {} ({})",
                b.id, b.name
            ))),
            None => Ok(()),
        }
    }

    /// Whether every oracle used for `blocks` reports exact minima.
    pub fn all_exact(&self, blocks: &[BlockModel]) -> bool {
        blocks
            .iter()
            .all(|b| self.for_block(b.id).map_or(false, |o| o.is_exact()))
    }
}

/// Result of pricing one block in a round.
#[derive(Debug, Clone)]
pub enum BlockOutcome {
    /// Oracle finished within the budget.
    Priced {
        /// Columns returned.
        columns: Vec<Column>,
        /// Best reduced cost reported by the oracle.
        best_reduced_cost: Option<f64>,
    },

    /// Budget exhausted before or while pricing; counts as no column.
    TimedOut,
}

/// Per-block record of a pricing round.
#[derive(Debug, Clone)]
pub struct BlockPricing {
    /// Block priced.
    pub block: BlockId,

    /// Outcome.
    pub outcome: BlockOutcome,

    /// Time spent in the oracle.
    pub elapsed: Duration,
}

impl BlockPricing {
    /// Columns returned (none on timeout).
    pub fn columns(&self) -> &[Column] {
        match &self.outcome {
            BlockOutcome::Priced { columns, .. } => columns,
            BlockOutcome::TimedOut => &[],
        }
    }

    /// Whether the block ran out of time.
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, BlockOutcome::TimedOut)
    }
}

fn price_block(
    oracles: &OracleSet,
    block: &BlockModel,
    prices: &[f64],
    target: PricingTarget,
    deadline: Option<Instant>,
) -> DecompResult<BlockPricing> {
    let start = Instant::now();
    if deadline.map_or(false, |d| start >= d) {
        log::warn!("block {}: pricing skipped, round budget exhausted", block.id);
        return Ok(BlockPricing {
            block: block.id,
            outcome: BlockOutcome::TimedOut,
            elapsed: Duration::ZERO,
        });
    }

    let oracle = oracles.for_block(block.id).ok_or_else(|| {
        DecompError::ConfigurationError(format!("no pricing oracle for block {}", block.id))
    })?;
    let result = oracle.price(block, prices, target)?;
    let elapsed = start.elapsed();

    if deadline.map_or(false, |d| Instant::now() > d) {
        log::warn!("{}", DecompError::OracleTimeout { block: block.id });
        return Ok(BlockPricing {
            block: block.id,
            outcome: BlockOutcome::TimedOut,
            elapsed,
        });
    }

    match result {
        PricingResult::Optimal {
            columns,
            best_reduced_cost,
        } => Ok(BlockPricing {
            block: block.id,
            outcome: BlockOutcome::Priced {
                columns,
                best_reduced_cost,
            },
            elapsed,
        }),
        PricingResult::Infeasible => Err(DecompError::BlockInfeasible { block: block.id }),
    }
}

/// Price every block. `targets[k]` is the target of block `k`.
///
/// With the `parallel` feature and `settings.parallel_pricing`, blocks are
/// priced on the rayon pool. Results come back in block order either way.
pub fn price_round(
    oracles: &OracleSet,
    blocks: &[BlockModel],
    prices: &[f64],
    targets: &[PricingTarget],
    settings: &DecompSettings,
) -> DecompResult<Vec<BlockPricing>> {
    if targets.len() != blocks.len() {
        return Err(DecompError::InvalidModel(format!(
            "{} targets for {} blocks",
            targets.len(),
            blocks.len()
        )));
    }
    let deadline = settings.pricing_time_budget.map(|b| Instant::now() + b);
    price_all(oracles, blocks, prices, targets, settings.parallel_pricing, deadline)
}

#[cfg(feature = "parallel")]
fn price_all(
    oracles: &OracleSet,
    blocks: &[BlockModel],
    prices: &[f64],
    targets: &[PricingTarget],
    parallel: bool,
    deadline: Option<Instant>,
) -> DecompResult<Vec<BlockPricing>> {
    if parallel {
        return blocks
            .par_iter()
            .zip(targets.par_iter())
            .map(|(block, &target)| price_block(oracles, block, prices, target, deadline))
            .collect();
    }
    price_sequential(oracles, blocks, prices, targets, deadline)
}

#[cfg(not(feature = "parallel"))]
fn price_all(
    oracles: &OracleSet,
    blocks: &[BlockModel],
    prices: &[f64],
    targets: &[PricingTarget],
    _parallel: bool,
    deadline: Option<Instant>,
) -> DecompResult<Vec<BlockPricing>> {
    price_sequential(oracles, blocks, prices, targets, deadline)
}

fn price_sequential(
    oracles: &OracleSet,
    blocks: &[BlockModel],
    prices: &[f64],
    targets: &[PricingTarget],
    deadline: Option<Instant>,
) -> DecompResult<Vec<BlockPricing>> {
    blocks
        .iter()
        .zip(targets)
        .map(|(block, &target)| price_block(oracles, block, prices, target, deadline))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Returns one fixed column per block, optionally after sleeping.
    struct FixedOracle {
        delay: Duration,
        infeasible: Option<BlockId>,
    }

    impl PricingOracle for FixedOracle {
        fn price(&self, block: &BlockModel, _prices: &[f64], target: PricingTarget) -> DecompResult<PricingResult> {
            if self.infeasible == Some(block.id) {
                return Ok(PricingResult::Infeasible);
            }
            thread::sleep(self.delay);
            let col = block.column_from_local(&[(0, 1.0)], 1.0)?;
            Ok(PricingResult::Optimal {
                columns: vec![col],
                best_reduced_cost: target.value().map(|t| 1.0 - t),
            })
        }
    }

    fn blocks(n: usize) -> Vec<BlockModel> {
        (0..n)
            .map(|k| BlockModel::new(k, format!("b{}", k), vec![k]).unwrap())
            .collect()
    }

    #[test]
    fn test_round_in_block_order() {
        let oracles = OracleSet::shared(Box::new(FixedOracle {
            delay: Duration::ZERO,
            infeasible: None,
        }));
        let blocks = blocks(3);
        let targets = vec![PricingTarget::Improve(2.0); 3];
        let out = price_round(&oracles, &blocks, &[0.0; 3], &targets, &DecompSettings::default()).unwrap();
        assert_eq!(out.len(), 3);
        for (k, bp) in out.iter().enumerate() {
            assert_eq!(bp.block, k);
            assert_eq!(bp.columns()[0].entries(), &[(k, 1.0)]);
        }
    }

    #[test]
    fn test_budget_degrades_to_no_column() {
        let oracles = OracleSet::shared(Box::new(FixedOracle {
            delay: Duration::from_millis(30),
            infeasible: None,
        }));
        let blocks = blocks(2);
        let targets = vec![PricingTarget::Improve(2.0); 2];
        let settings = DecompSettings::default().with_pricing_time_budget(Duration::from_millis(5));
        let out = price_round(&oracles, &blocks, &[0.0; 2], &targets, &settings).unwrap();
        assert!(out.iter().all(|bp| bp.timed_out()));
        assert!(out.iter().all(|bp| bp.columns().is_empty()));
    }

    #[test]
    fn test_infeasible_block_is_an_error() {
        let oracles = OracleSet::shared(Box::new(FixedOracle {
            delay: Duration::ZERO,
            infeasible: Some(1),
        }));
        let blocks = blocks(2);
        let targets = vec![PricingTarget::InitialColumns; 2];
        let err = price_round(&oracles, &blocks, &[0.0; 2], &targets, &DecompSettings::default()).unwrap_err();
        assert_eq!(err, DecompError::BlockInfeasible { block: 1 });
    }

    #[test]
    fn test_missing_oracle() {
        let oracles = OracleSet::default().with_block(
            0,
            Box::new(FixedOracle {
                delay: Duration::ZERO,
                infeasible: None,
            }),
        );
        let blocks = blocks(2);
        assert!(oracles.for_block(0).is_some());
        assert!(oracles.validate(&blocks).is_err());
        assert!(!oracles.all_exact(&blocks));
        assert!(oracles.validate(&blocks[..1]).is_ok());
    }
}

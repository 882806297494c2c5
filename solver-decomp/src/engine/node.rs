//! Price-and-cut loop for one branch-and-bound node.
//!
//! ```text
//! Init -> Feasibility -> Pricing <-> Cutting -> Done
//! ```
//! Each pricing round solves the restricted master, smooths its duals, prices
//! every block and adds the improving columns. The round re-prices with the
//! raw duals when the smoothed ones produce nothing (mispricing), so the loop
//! only stops once the raw duals admit no improving column.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{CutRound, NodeHooks, Phase, PricingRound, RoundControl, SolverContext};
use crate::cuts::{CutGenerator, CutPool};
use crate::error::{DecompError, DecompResult};
use crate::master::{MasterSolution, RestrictedMaster, RowKind};
use crate::model::{
    compute_gap, BlockId, BlockModel, Column, MasterModel, NodeSolution, NodeStats, NodeStatus, Row,
};
use crate::pricing::{price_round, BlockOutcome, OracleSet, PricingTarget};
use crate::settings::DecompSettings;
use crate::stabilization::DualStabilizer;

/// Why a column-generation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// No improving column under the raw duals.
    Converged,
    /// Artificial columns left the master.
    Feasible,
    GapClosed,
    RoundLimit,
    Cancelled,
    Stopped,
    /// No column, but some block timed out.
    TimedOut,
}

impl LoopEnd {
    fn status(self) -> NodeStatus {
        match self {
            LoopEnd::Converged | LoopEnd::Feasible => NodeStatus::Optimal,
            LoopEnd::GapClosed => NodeStatus::GapClosed,
            LoopEnd::RoundLimit => NodeStatus::RoundLimit,
            LoopEnd::Cancelled => NodeStatus::Cancelled,
            LoopEnd::Stopped => NodeStatus::Stopped,
            LoopEnd::TimedOut => NodeStatus::TimedOut,
        }
    }
}

/// Outcome of a cutting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutEnd {
    Added,
    NoCuts,
    RolledBack,
    Stopped,
}

/// Result of pricing all blocks against one dual vector.
struct PricePass {
    added: usize,
    timed_out: usize,
    bound: Option<f64>,
}

struct NodeRun<'a> {
    settings: &'a DecompSettings,
    model: &'a MasterModel,
    blocks: &'a [BlockModel],
    oracles: &'a OracleSet,
    cut_generator: &'a mut Option<Box<dyn CutGenerator>>,
    cut_pool: &'a mut CutPool,
    hooks: &'a mut Box<dyn NodeHooks>,
    cancel: &'a AtomicBool,

    rm: RestrictedMaster<'a>,
    stab: DualStabilizer,
    stats: NodeStats,

    /// Every oracle reports exact minima.
    exact: bool,
    rounds: usize,
    cut_rounds: usize,
    best_bound: f64,
    last_objective: f64,

    /// (master row, pool id) of each cut row in the master.
    cut_rows: Vec<(usize, usize)>,
    generated_cuts: Vec<Row>,
}

/// Run price-and-cut on one node.
///
/// `master` carries the branching bounds of the node; `warm_start` columns
/// (typically the parent's final columns) are added before any pricing.
/// Node failures are returned as errors; see [`DecompError::is_node_failure`].
pub fn solve_node(
    ctx: &mut SolverContext,
    master: &MasterModel,
    blocks: &[BlockModel],
    warm_start: Vec<Column>,
) -> DecompResult<NodeSolution> {
    let start = Instant::now();
    ctx.settings.validate()?;
    ctx.oracles.validate(blocks)?;

    let SolverContext {
        settings,
        lp,
        oracles,
        cut_generator,
        cut_pool,
        hooks,
        cancel,
    } = ctx;
    let settings: &DecompSettings = settings;
    let oracles: &OracleSet = oracles;

    let rm = RestrictedMaster::new(master, blocks, &mut **lp)?;
    let mut run = NodeRun {
        settings,
        model: master,
        blocks,
        exact: oracles.all_exact(blocks),
        oracles,
        cut_generator,
        cut_pool,
        hooks,
        cancel: &**cancel,
        rm,
        stab: DualStabilizer::new(settings.dual_stab, settings.dual_stab_alpha),
        stats: NodeStats::default(),
        rounds: 0,
        cut_rounds: 0,
        best_bound: f64::NEG_INFINITY,
        last_objective: f64::INFINITY,
        cut_rows: Vec::new(),
        generated_cuts: Vec::new(),
    };

    match run.run(warm_start) {
        Ok(status) => {
            let solution = run.finish(status, start);
            if settings.verbose {
                log::info!(
                    "Node done: {:?} | Obj: {:.6e} | Bound: {:.6e} | Rounds: {} | Cols: {} | Cuts: {} | Time: {}ms",
                    solution.status,
                    solution.objective,
                    solution.bound,
                    solution.stats.price_calls_total,
                    solution.columns.len(),
                    solution.stats.cuts_added,
                    solution.stats.solve_time_ms,
                );
            }
            Ok(solution)
        }
        Err(e) => {
            log::warn!("Node failed after {} pricing rounds: {}", run.rounds, e);
            Err(e)
        }
    }
}

impl<'a> NodeRun<'a> {
    fn run(&mut self, warm_start: Vec<Column>) -> DecompResult<NodeStatus> {
        let mut warm_start = Some(warm_start);
        let mut status = NodeStatus::Optimal;
        let mut phase = Phase::Init;

        while phase != Phase::Done {
            if self.settings.verbose {
                log::info!(
                    "Phase {} | Rows: {} | Cols: {}",
                    phase,
                    self.rm.num_rows(),
                    self.rm.num_columns()
                );
            }

            phase = match phase {
                Phase::Init => {
                    self.initial_columns(warm_start.take().unwrap_or_default())?;
                    self.rm.set_phase_one(true);
                    Phase::Feasibility
                }
                Phase::Feasibility => match self.generate_columns(Phase::Feasibility)? {
                    LoopEnd::Feasible => {
                        self.rm.set_phase_one(false);
                        self.stab.begin_phase();
                        Phase::Pricing
                    }
                    end => {
                        status = end.status();
                        Phase::Done
                    }
                },
                Phase::Pricing => {
                    let end = self.generate_columns(Phase::Pricing)?;
                    status = end.status();
                    let converged = matches!(end, LoopEnd::Converged | LoopEnd::GapClosed);
                    if converged && self.cutting_enabled() && self.cut_rounds < self.settings.max_cut_rounds {
                        Phase::Cutting
                    } else {
                        Phase::Done
                    }
                }
                Phase::Cutting => {
                    if self.is_cancelled() {
                        status = NodeStatus::Cancelled;
                        Phase::Done
                    } else {
                        match self.separate()? {
                            CutEnd::Added => {
                                self.stab.begin_phase();
                                Phase::Pricing
                            }
                            CutEnd::NoCuts | CutEnd::RolledBack => Phase::Done,
                            CutEnd::Stopped => {
                                status = NodeStatus::Stopped;
                                Phase::Done
                            }
                        }
                    }
                }
                Phase::Done => Phase::Done,
            };
        }
        Ok(status)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn cutting_enabled(&self) -> bool {
        self.cut_generator.is_some() || !self.cut_pool.is_empty()
    }

    /// Warm start, hook columns, then one `InitialColumns` call per block.
    fn initial_columns(&mut self, warm_start: Vec<Column>) -> DecompResult<()> {
        let mut warm = 0;
        for column in warm_start {
            if self.rm.add_column(column)?.is_some() {
                warm += 1;
            }
        }

        let mut added = 0;
        for column in self.hooks.on_initial_columns(self.blocks) {
            if self.rm.add_column(column)?.is_some() {
                added += 1;
            }
        }

        let targets = vec![PricingTarget::InitialColumns; self.blocks.len()];
        let results = price_round(self.oracles, self.blocks, &self.model.objective, &targets, self.settings)?;
        for bp in results {
            match bp.outcome {
                BlockOutcome::Priced { columns, .. } => {
                    for column in columns {
                        self.check_column(bp.block, &column)?;
                        if self.rm.add_column(column)?.is_some() {
                            added += 1;
                        }
                    }
                }
                BlockOutcome::TimedOut => self.stats.oracle_timeouts += 1,
            }
        }
        self.stats.columns_generated += added as u64;

        if self.settings.verbose {
            log::info!("Initial columns: {} warm start, {} generated", warm, added);
        }
        Ok(())
    }

    fn solve_master(&mut self) -> DecompResult<MasterSolution> {
        let sol = self.rm.solve()?;
        self.stats.master_solves += 1;
        self.stab.resize(self.rm.num_rows());

        if !self.rm.is_phase_one() {
            self.stats.objective_history.push(sol.objective);
            self.last_objective = sol.objective;
            if !self.cut_rows.is_empty() {
                let duals: Vec<(usize, f64)> = self
                    .cut_rows
                    .iter()
                    .map(|&(r, id)| (id, sol.duals[r]))
                    .collect();
                self.cut_pool.update_activity(&duals);
            }
        }
        Ok(sol)
    }

    /// Price every block against `duals` and add the improving columns.
    ///
    /// Reduced costs are recomputed from the column entries; the bound is
    /// `sum_r pi_r beta_r + sum_k min(best_rc_k, 0)`.
    fn price_pass(&mut self, duals: &[f64]) -> DecompResult<PricePass> {
        let prices = self.rm.priced_costs(duals);
        let mu: Vec<f64> = (0..self.blocks.len())
            .map(|k| self.rm.convexity_dual(k, duals))
            .collect();
        let targets: Vec<PricingTarget> = mu.iter().map(|&t| PricingTarget::Improve(t)).collect();

        let results = price_round(self.oracles, self.blocks, &prices, &targets, self.settings)?;

        let mut bound_valid = self.exact;
        let mut block_term = 0.0;
        let mut added = 0;
        let mut timed_out = 0;
        for bp in results {
            match bp.outcome {
                BlockOutcome::TimedOut => {
                    self.stats.oracle_timeouts += 1;
                    timed_out += 1;
                    bound_valid = false;
                }
                BlockOutcome::Priced {
                    columns,
                    best_reduced_cost,
                } => {
                    let mut best = best_reduced_cost.unwrap_or(0.0);
                    for column in columns {
                        self.check_column(bp.block, &column)?;
                        let rc = column.price(&prices) - mu[bp.block];
                        best = best.min(rc);
                        if rc < -self.settings.red_cost_tol
                            && self.rm.add_column(column.with_reduced_cost(rc))?.is_some()
                        {
                            added += 1;
                        }
                    }
                    block_term += best.min(0.0);
                }
            }
        }
        self.stats.columns_generated += added as u64;

        let bound = if bound_valid {
            self.rm.dual_row_term(duals).map(|t| t + block_term)
        } else {
            None
        };
        Ok(PricePass {
            added,
            timed_out,
            bound,
        })
    }

    /// Reject oracle columns for another block or outside the original space.
    fn check_column(&self, block: BlockId, column: &Column) -> DecompResult<()> {
        if column.block() != block {
            return Err(DecompError::InvalidModel(format!(
                "oracle returned a column of block {} while pricing block {}",
                column.block(),
                block
            )));
        }
        if let Some(j) = column.max_index().filter(|&j| j >= self.model.num_vars()) {
            return Err(DecompError::InvalidModel(format!(
                "block {}: column entry {} out of range for {} variables",
                block,
                j,
                self.model.num_vars()
            )));
        }
        Ok(())
    }

    /// Column generation until convergence or a stop condition.
    fn generate_columns(&mut self, phase: Phase) -> DecompResult<LoopEnd> {
        let phase_one = phase == Phase::Feasibility;
        let mut phase_bound = f64::NEG_INFINITY;

        loop {
            if self.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }

            let sol = self.solve_master()?;
            if phase_one && sol.objective <= self.settings.feas_tol {
                return Ok(LoopEnd::Feasible);
            }
            if self.rounds >= self.settings.max_pricing_rounds {
                return Ok(LoopEnd::RoundLimit);
            }

            self.rm.update_activity(self.settings.zero_tol);
            let compressed = self
                .rm
                .compress(self.settings.column_compression_threshold, self.settings.zero_tol);
            self.stats.columns_compressed += compressed as u64;

            self.rounds += 1;
            self.stats.price_calls_total += 1;
            let smoothed = self.stab.smoothed(&sol.duals, &self.stats).to_vec();
            let mut pass = self.price_pass(&smoothed)?;
            if let Some(b) = pass.bound {
                self.stab.record_bound(b);
            }
            let mut bound = pass.bound;

            let mispriced = pass.added == 0 && smoothed != sol.duals;
            if mispriced {
                log::warn!(
                    "Round {}: smoothed duals found no column, re-pricing with master duals",
                    self.rounds
                );
                self.stats.mispricings += 1;
                self.stats.price_calls_total += 1;
                pass = self.price_pass(&sol.duals)?;
                bound = match (bound, pass.bound) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }

            if let Some(b) = bound {
                if phase_one {
                    phase_bound = phase_bound.max(b);
                } else {
                    self.best_bound = self.best_bound.max(b);
                }
            }
            if !phase_one && self.best_bound.is_finite() {
                self.stats.bound_history.push(self.best_bound);
            }
            self.log_round(phase, sol.objective, pass.added);

            let round = PricingRound {
                round: self.rounds,
                phase,
                master_objective: sol.objective,
                bound,
                best_bound: if phase_one { phase_bound } else { self.best_bound },
                columns_added: pass.added,
                mispriced,
                duals: &sol.duals,
            };
            if self.hooks.on_pricing_round(&round) == RoundControl::Stop {
                return Ok(LoopEnd::Stopped);
            }

            if pass.added == 0 {
                if pass.timed_out > 0 {
                    log::warn!(
                        "Round {}: no column and {} block(s) timed out, node left unresolved",
                        self.rounds,
                        pass.timed_out
                    );
                    return Ok(LoopEnd::TimedOut);
                }
                if phase_one {
                    return Err(DecompError::MasterInfeasible(format!(
                        "phase one stalled with artificial sum {:.3e}",
                        sol.objective
                    )));
                }
                return Ok(LoopEnd::Converged);
            }
            if phase_one && phase_bound > self.settings.feas_tol {
                return Err(DecompError::MasterInfeasible(format!(
                    "phase one bound {:.3e} proves the node infeasible",
                    phase_bound
                )));
            }
            if !phase_one && compute_gap(sol.objective, self.best_bound) <= self.settings.gap_tol {
                return Ok(LoopEnd::GapClosed);
            }
        }
    }

    /// One cutting round against the current fractional point.
    fn separate(&mut self) -> DecompResult<CutEnd> {
        self.cut_rounds += 1;
        self.stats.cut_calls_total += 1;

        let x = self.rm.original_solution();
        let tol = self.settings.cut_violation_tol;
        let in_master: HashSet<usize> = self.cut_rows.iter().map(|&(_, id)| id).collect();

        let mut batch: Vec<(usize, Row)> = Vec::new();
        for (id, row) in self.cut_pool.violated(&x, tol) {
            if !in_master.contains(&id) {
                self.cut_pool.activate(id);
                batch.push((id, row));
            }
        }

        if let Some(generator) = self.cut_generator.as_mut() {
            for row in generator.generate_cuts(&x) {
                if !row.is_valid() || row.max_index().map_or(false, |j| j >= x.len()) {
                    log::warn!("{}: discarding malformed cut {:?}", generator.name(), row.name);
                    continue;
                }
                if !row.is_violated(&x, tol) {
                    continue;
                }
                let (id, duplicate) = self.cut_pool.add(row.clone());
                if in_master.contains(&id) || batch.iter().any(|(b, _)| *b == id) {
                    continue;
                }
                if !duplicate {
                    self.generated_cuts.push(row.clone());
                }
                batch.push((id, row));
            }
        }

        let first = self.rm.num_rows();
        for (id, row) in &batch {
            let r = self.rm.add_row(row.clone(), RowKind::Cut)?;
            self.cut_rows.push((r, *id));
        }
        self.stab.resize(self.rm.num_rows());
        self.stats.cuts_added += batch.len() as u64;

        let control = self.hooks.on_cut_round(&CutRound {
            round: self.cut_rounds,
            x: &x,
            cuts_added: batch.len(),
        });
        if self.settings.verbose {
            log::info!("Cut round {} | Added: {} | Pool: {}", self.cut_rounds, batch.len(), self.cut_pool.len());
        }

        if batch.is_empty() {
            return Ok(CutEnd::NoCuts);
        }

        match self.solve_master() {
            Ok(_) => {}
            Err(DecompError::MasterInfeasible(msg)) => {
                log::warn!("Master infeasible after {} cuts ({}), rolling back", batch.len(), msg);
                self.rm.remove_rows_from(first)?;
                self.cut_rows.retain(|&(r, _)| r < first);
                self.stab.resize(self.rm.num_rows());
                self.stats.cut_rollbacks += 1;
                return Ok(CutEnd::RolledBack);
            }
            Err(e) => return Err(e),
        }

        if control == RoundControl::Stop {
            return Ok(CutEnd::Stopped);
        }
        Ok(CutEnd::Added)
    }

    fn log_round(&self, phase: Phase, objective: f64, added: usize) {
        if !self.settings.verbose || self.rounds % self.settings.log_freq.max(1) != 0 {
            return;
        }
        log::info!(
            "{} round {:>4} | Obj: {:.6e} | Bound: {:.6e} | Gap: {:.2}% | Cols: {} (+{})",
            phase,
            self.rounds,
            objective,
            self.best_bound,
            compute_gap(objective, self.best_bound) * 100.0,
            self.rm.num_columns(),
            added,
        );
    }

    fn finish(mut self, status: NodeStatus, start: Instant) -> NodeSolution {
        let x = self.rm.original_solution();
        let phase_two = !self.rm.is_phase_one();

        let integral = phase_two
            && self.model.is_integer_feasible(&x, self.settings.feas_tol)
            && self.hooks.on_feasible_solution(&x);

        self.stats.solve_time_ms = start.elapsed().as_millis() as u64;
        NodeSolution {
            status,
            bound: self.best_bound,
            objective: if phase_two { self.last_objective } else { f64::INFINITY },
            x,
            lambda: self.rm.lambda().to_vec(),
            columns: self.rm.columns().to_vec(),
            generated_cuts: self.generated_cuts,
            integral,
            stats: self.stats,
        }
    }
}

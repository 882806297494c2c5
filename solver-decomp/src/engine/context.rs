//! Everything a node solve needs besides the model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{NoHooks, NodeHooks};
use crate::cuts::{CutGenerator, CutPool};
use crate::error::DecompResult;
use crate::master::LpSolver;
use crate::pricing::OracleSet;
use crate::settings::DecompSettings;

/// Solver state shared by all nodes of a tree search.
///
/// The cut pool persists across nodes; the LP solver is lent to each node's
/// restricted master.
pub struct SolverContext {
    pub(crate) settings: DecompSettings,
    pub(crate) lp: Box<dyn LpSolver>,
    pub(crate) oracles: OracleSet,
    pub(crate) cut_generator: Option<Box<dyn CutGenerator>>,
    pub(crate) cut_pool: CutPool,
    pub(crate) hooks: Box<dyn NodeHooks>,
    pub(crate) cancel: Arc<AtomicBool>,
}

impl SolverContext {
    /// Create a context. Fails on invalid settings.
    pub fn new(settings: DecompSettings, lp: Box<dyn LpSolver>, oracles: OracleSet) -> DecompResult<Self> {
        settings.validate()?;
        let cut_pool = CutPool::new(settings.cut_pool.clone());
        Ok(Self {
            settings,
            lp,
            oracles,
            cut_generator: None,
            cut_pool,
            hooks: Box::new(NoHooks),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Attach a cut generator (enables the cutting phase).
    pub fn with_cut_generator(mut self, generator: Box<dyn CutGenerator>) -> Self {
        self.cut_generator = Some(generator);
        self
    }

    /// Install lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Box<dyn NodeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Share an external cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Flag that stops the node loop at the next round boundary when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation before solving another node.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Settings.
    pub fn settings(&self) -> &DecompSettings {
        &self.settings
    }

    /// Mutable settings (validated again at the next solve).
    pub fn settings_mut(&mut self) -> &mut DecompSettings {
        &mut self.settings
    }

    /// Cut pool.
    pub fn cut_pool(&self) -> &CutPool {
        &self.cut_pool
    }
}

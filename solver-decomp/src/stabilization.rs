//! Wentges dual smoothing.
//!
//! Pricing uses `dual_st = alpha * dual + (1 - alpha) * dual_rm`, where
//! `dual_rm` are the raw master duals and `dual` is the stability center. The
//! center moves to `dual_st` only when the Lagrangian bound strictly improves
//! within the current phase.

use crate::model::NodeStats;

/// Dual smoothing state for one node.
#[derive(Debug, Clone)]
pub struct DualStabilizer {
    enabled: bool,
    alpha: f64,

    /// Stability center.
    dual: Vec<f64>,

    /// Raw master duals of the current round.
    dual_rm: Vec<f64>,

    /// Smoothed duals handed to pricing.
    dual_st: Vec<f64>,

    /// Best bound seen in the current phase.
    best_bound: f64,

    /// Next call resets the center.
    phase_start: bool,
}

impl DualStabilizer {
    /// Create a stabilizer. With `enabled == false` raw duals pass through.
    pub fn new(enabled: bool, alpha: f64) -> Self {
        Self {
            enabled,
            alpha,
            dual: Vec::new(),
            dual_rm: Vec::new(),
            dual_st: Vec::new(),
            best_bound: f64::NEG_INFINITY,
            phase_start: true,
        }
    }

    /// Resize all dual vectors to `rows`; new rows get zero.
    pub fn resize(&mut self, rows: usize) {
        self.dual.resize(rows, 0.0);
        self.dual_rm.resize(rows, 0.0);
        self.dual_st.resize(rows, 0.0);
    }

    /// Start a new phase: the next call re-centers on the raw duals.
    pub fn begin_phase(&mut self) {
        self.best_bound = f64::NEG_INFINITY;
        self.phase_start = true;
    }

    /// Compute the duals used for pricing.
    ///
    /// On the first call of a phase (or of the node, when `stats` shows a
    /// single call so far) the center is set to the raw duals.
    pub fn smoothed(&mut self, raw: &[f64], stats: &NodeStats) -> &[f64] {
        self.resize(raw.len());
        self.dual_rm.copy_from_slice(raw);

        if !self.enabled {
            self.dual_st.copy_from_slice(raw);
            return &self.dual_st;
        }

        if self.phase_start || stats.total_calls() == 1 {
            self.dual.copy_from_slice(raw);
            self.phase_start = false;
        }

        let alpha = self.alpha;
        for ((st, &center), &rm) in self.dual_st.iter_mut().zip(&self.dual).zip(&self.dual_rm) {
            *st = alpha * center + (1.0 - alpha) * rm;
        }

        if log::log_enabled!(log::Level::Debug) {
            for (r, ((d, rm), st)) in self.dual.iter().zip(&self.dual_rm).zip(&self.dual_st).enumerate() {
                log::debug!("r={:>4} dual={:>12.6} dual_rm={:>12.6} dual_st={:>12.6}", r, d, rm, st);
            }
        }

        &self.dual_st
    }

    /// Record the Lagrangian bound obtained from the last smoothed duals.
    ///
    /// Returns true (and moves the center) on a strict improvement.
    pub fn record_bound(&mut self, bound: f64) -> bool {
        if !(bound > self.best_bound) {
            return false;
        }
        self.best_bound = bound;
        if self.enabled {
            self.dual.copy_from_slice(&self.dual_st);
        }
        true
    }

    /// Best bound recorded in this phase.
    pub fn best_bound(&self) -> f64 {
        self.best_bound
    }

    /// Stability center.
    pub fn center(&self) -> &[f64] {
        &self.dual
    }

    /// Raw duals of the last call.
    pub fn raw(&self) -> &[f64] {
        &self.dual_rm
    }

    /// Smoothed duals of the last call.
    pub fn current(&self) -> &[f64] {
        &self.dual_st
    }

    /// Whether smoothing is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with_calls(price: u64) -> NodeStats {
        NodeStats {
            price_calls_total: price,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_call_uses_raw_duals() {
        let mut stab = DualStabilizer::new(true, 0.75);
        let out = stab.smoothed(&[1.0, -2.0], &stats_with_calls(1)).to_vec();
        assert_eq!(out, vec![1.0, -2.0]);
        assert_eq!(stab.center(), &[1.0, -2.0]);
    }

    #[test]
    fn test_smoothing_mixes_center_and_raw() {
        let mut stab = DualStabilizer::new(true, 0.5);
        stab.smoothed(&[2.0, 0.0], &stats_with_calls(1));
        assert!(stab.record_bound(1.0));

        let out = stab.smoothed(&[0.0, 4.0], &stats_with_calls(2)).to_vec();
        assert_eq!(out, vec![1.0, 2.0]);

        // No strict improvement: center stays.
        assert!(!stab.record_bound(1.0));
        assert_eq!(stab.center(), &[2.0, 0.0]);

        // Strict improvement: center moves to the smoothed point.
        assert!(stab.record_bound(1.5));
        assert_eq!(stab.center(), &[1.0, 2.0]);
    }

    #[test]
    fn test_alpha_zero_is_raw() {
        let mut stab = DualStabilizer::new(true, 0.0);
        stab.smoothed(&[5.0, 5.0], &stats_with_calls(1));
        stab.record_bound(3.0);
        for round in 2..6 {
            let raw = [round as f64, -(round as f64)];
            let out = stab.smoothed(&raw, &stats_with_calls(round)).to_vec();
            assert_eq!(out, raw.to_vec());
        }
    }

    #[test]
    fn test_begin_phase_recenters() {
        let mut stab = DualStabilizer::new(true, 0.5);
        stab.smoothed(&[1.0], &stats_with_calls(1));
        stab.record_bound(10.0);

        stab.begin_phase();
        assert_eq!(stab.best_bound(), f64::NEG_INFINITY);
        let out = stab.smoothed(&[-3.0], &stats_with_calls(7)).to_vec();
        assert_eq!(out, vec![-3.0]);

        // A lower bound than the previous phase still counts as an improvement.
        assert!(stab.record_bound(-1.0));
    }

    #[test]
    fn test_disabled_passes_raw() {
        let mut stab = DualStabilizer::new(false, 0.5);
        stab.smoothed(&[1.0, 1.0], &stats_with_calls(1));
        let out = stab.smoothed(&[3.0, -1.0], &stats_with_calls(2)).to_vec();
        assert_eq!(out, vec![3.0, -1.0]);
    }

    #[test]
    fn test_resize_pads_new_rows() {
        let mut stab = DualStabilizer::new(true, 0.5);
        stab.smoothed(&[1.0, 1.0], &stats_with_calls(1));
        stab.resize(3);
        assert_eq!(stab.center(), &[1.0, 1.0, 0.0]);

        let out = stab.smoothed(&[1.0, 1.0, 2.0], &stats_with_calls(2)).to_vec();
        assert_eq!(out, vec![1.0, 1.0, 1.0]);

        stab.resize(1);
        assert_eq!(stab.current().len(), 1);
    }
}

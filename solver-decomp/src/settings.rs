//! Configuration settings for the column-generation engine.

use std::time::Duration;

use crate::cuts::CutPoolSettings;
use crate::error::{DecompError, DecompResult};

/// Engine settings.
#[derive(Debug, Clone)]
pub struct DecompSettings {
    // === Dual stabilization ===
    /// Smooth master duals before pricing.
    pub dual_stab: bool,

    /// Weight of the stabilization center, in [0, 1).
    /// `dual_st = alpha * center + (1 - alpha) * raw`.
    pub dual_stab_alpha: f64,

    // === Pricing ===
    /// Wall-clock budget per pricing round (None = unlimited).
    /// Blocks finishing past the deadline are treated as returning no column.
    pub pricing_time_budget: Option<Duration>,

    /// Price blocks concurrently (requires the `parallel` feature).
    pub parallel_pricing: bool,

    /// A column is improving only if its reduced cost is below `-red_cost_tol`.
    pub red_cost_tol: f64,

    // === Master housekeeping ===
    /// Consecutive rounds at zero value before a column may be compressed out.
    pub column_compression_threshold: usize,

    /// Primal values at or below this are treated as zero.
    pub zero_tol: f64,

    /// Phase-one objective at or below this means the master is feasible.
    pub feas_tol: f64,

    // === Termination ===
    /// Relative gap between master objective and Lagrangian bound that ends pricing.
    pub gap_tol: f64,

    /// Maximum pricing rounds per node.
    pub max_pricing_rounds: usize,

    /// Maximum cutting rounds per node.
    pub max_cut_rounds: usize,

    // === Cuts ===
    /// Minimum violation for a cut to be added to the master.
    pub cut_violation_tol: f64,

    /// Settings for the cut pool.
    pub cut_pool: CutPoolSettings,

    // === Output ===
    /// Print progress information.
    pub verbose: bool,

    /// Log frequency (print every N rounds).
    pub log_freq: usize,
}

impl Default for DecompSettings {
    fn default() -> Self {
        Self {
            // Stabilization
            dual_stab: true,
            dual_stab_alpha: 0.5,

            // Pricing
            pricing_time_budget: None,
            parallel_pricing: false,
            red_cost_tol: 1e-6,

            // Master
            column_compression_threshold: 20,
            zero_tol: 1e-7,
            feas_tol: 1e-6,

            // Termination
            gap_tol: 1e-6,
            max_pricing_rounds: 500,
            max_cut_rounds: 20,

            // Cuts
            cut_violation_tol: 1e-6,
            cut_pool: CutPoolSettings::default(),

            // Output
            verbose: false,
            log_freq: 10,
        }
    }
}

impl DecompSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.verbose = true;
        s.log_freq = 1;
        s
    }

    /// Overlay `DECOMP_VERBOSE` and `DECOMP_DUAL_STAB_ALPHA` from the environment.
    pub fn from_env() -> DecompResult<Self> {
        let mut s = Self::default();
        if let Ok(v) = std::env::var("DECOMP_VERBOSE") {
            s.verbose = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Ok(v) = std::env::var("DECOMP_DUAL_STAB_ALPHA") {
            s.dual_stab_alpha = v.trim().parse().map_err(|_| {
                DecompError::ConfigurationError(format!(
                    "DECOMP_DUAL_STAB_ALPHA is not a number: {:?}",
                    v
                ))
            })?;
        }
        s.validate()?;
        Ok(s)
    }

    /// Enable or disable dual stabilization.
    pub fn with_dual_stab(mut self, enabled: bool) -> Self {
        self.dual_stab = enabled;
        self
    }

    /// Set the smoothing weight.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.dual_stab_alpha = alpha;
        self
    }

    /// Set the per-round pricing budget.
    pub fn with_pricing_time_budget(mut self, budget: Duration) -> Self {
        self.pricing_time_budget = Some(budget);
        self
    }

    /// Set the column compression threshold.
    pub fn with_compression_threshold(mut self, rounds: usize) -> Self {
        self.column_compression_threshold = rounds;
        self
    }

    /// Set maximum pricing rounds.
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_pricing_rounds = rounds;
        self
    }

    /// Reject invalid parameter combinations.
    pub fn validate(&self) -> DecompResult<()> {
        let alpha = self.dual_stab_alpha;
        if !alpha.is_finite() || !(0.0..1.0).contains(&alpha) {
            return Err(DecompError::ConfigurationError(format!(
                "DualStabAlpha must lie in [0, 1), got {}",
                alpha
            )));
        }

        let tolerances = [
            ("red_cost_tol", self.red_cost_tol),
            ("zero_tol", self.zero_tol),
            ("feas_tol", self.feas_tol),
            ("gap_tol", self.gap_tol),
            ("cut_violation_tol", self.cut_violation_tol),
        ];
        for (name, tol) in tolerances {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(DecompError::ConfigurationError(format!(
                    "{} must be positive and finite, got {}",
                    name, tol
                )));
            }
        }

        if self.column_compression_threshold == 0 {
            return Err(DecompError::ConfigurationError(
                "ColumnCompressionThreshold must be at least 1".to_string(),
            ));
        }
        if self.max_pricing_rounds == 0 {
            return Err(DecompError::ConfigurationError(
                "max_pricing_rounds must be at least 1".to_string(),
            ));
        }
        if self.pricing_time_budget == Some(Duration::ZERO) {
            return Err(DecompError::ConfigurationError(
                "PricingTimeBudget must be non-zero".to_string(),
            ));
        }
        if self.parallel_pricing && !cfg!(feature = "parallel") {
            log::warn!("parallel_pricing requested but the `parallel` feature is disabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DecompSettings::default().validate().is_ok());
        assert!(DecompSettings::verbose().validate().is_ok());
    }

    #[test]
    fn test_alpha_range() {
        assert!(DecompSettings::default().with_alpha(0.0).validate().is_ok());
        assert!(DecompSettings::default().with_alpha(0.99).validate().is_ok());

        for bad in [1.0, -0.1, 1.5, f64::NAN] {
            let err = DecompSettings::default().with_alpha(bad).validate().unwrap_err();
            assert!(matches!(err, DecompError::ConfigurationError(_)), "alpha={}", bad);
        }
    }

    #[test]
    fn test_invalid_thresholds() {
        let s = DecompSettings::default().with_compression_threshold(0);
        assert!(s.validate().is_err());

        let s = DecompSettings::default().with_max_rounds(0);
        assert!(s.validate().is_err());

        let s = DecompSettings::default().with_pricing_time_budget(Duration::ZERO);
        assert!(s.validate().is_err());

        let mut s = DecompSettings::default();
        s.red_cost_tol = 0.0;
        assert!(s.validate().is_err());
    }
}

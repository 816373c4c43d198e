//! Grid defaults shared by the density engine and the built-in policies.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Smallest bin count any grid may have.
pub const MIN_BINS: usize = 2;

/// Smallest bin count used by the canonical (A/B) grid builder.
pub const CANONICAL_MIN_BINS: usize = 5;

/// Default span floor used to widen degenerate axis ranges.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Configuration for grid construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Default number of bins along x for built-in policies.
    #[serde(default = "default_bins")]
    pub default_bins_x: usize,

    /// Default number of bins along y for built-in policies.
    #[serde(default = "default_bins")]
    pub default_bins_y: usize,

    /// Span floor: ranges narrower than this are widened by it.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Lower percentile used by the robust built-in policy.
    #[serde(default = "default_robust_low")]
    pub robust_low_percentile: f64,

    /// Upper percentile used by the robust built-in policy.
    #[serde(default = "default_robust_high")]
    pub robust_high_percentile: f64,
}

fn default_bins() -> usize {
    64
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

fn default_robust_low() -> f64 {
    1.0
}

fn default_robust_high() -> f64 {
    99.0
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_bins_x: default_bins(),
            default_bins_y: default_bins(),
            epsilon: default_epsilon(),
            robust_low_percentile: default_robust_low(),
            robust_high_percentile: default_robust_high(),
        }
    }
}

impl GridConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if a default bin count is below `MIN_BINS`
    /// - `EngineError::ConfigError` if epsilon is not finite and positive
    /// - `EngineError::ConfigError` if the robust percentiles are not `0 <= low < high <= 100`
    pub fn validate(&self) -> EngineResult<()> {
        if self.default_bins_x < MIN_BINS || self.default_bins_y < MIN_BINS {
            return Err(EngineError::ConfigError(format!(
                "default bins must be >= {} (got {}x{})",
                MIN_BINS, self.default_bins_x, self.default_bins_y
            )));
        }

        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(EngineError::ConfigError(format!(
                "epsilon must be finite and > 0 (got {})",
                self.epsilon
            )));
        }

        let (low, high) = (self.robust_low_percentile, self.robust_high_percentile);
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
            return Err(EngineError::ConfigError(format!(
                "robust percentiles must satisfy 0 <= low < high <= 100 (got {}, {})",
                low, high
            )));
        }

        Ok(())
    }
}

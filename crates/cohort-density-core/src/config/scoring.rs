//! Dependence-scoring limits.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Configuration for the pair scorer's sampling caps and binning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Kendall tau is computed on at most this many stride-sampled points.
    #[serde(default = "default_kendall_max_samples")]
    pub kendall_max_samples: usize,

    /// Distance correlation is computed on at most this many stride-sampled points.
    #[serde(default = "default_dcor_max_samples")]
    pub dcor_max_samples: usize,

    /// Equal-width bins per variable for normalized mutual information.
    #[serde(default = "default_mi_bins")]
    pub mi_bins: usize,
}

fn default_kendall_max_samples() -> usize {
    2_000
}

fn default_dcor_max_samples() -> usize {
    4_000
}

fn default_mi_bins() -> usize {
    16
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            kendall_max_samples: default_kendall_max_samples(),
            dcor_max_samples: default_dcor_max_samples(),
            mi_bins: default_mi_bins(),
        }
    }
}

impl ScoringConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if a sampling cap is below 2
    /// - `EngineError::ConfigError` if mi_bins is below 2
    pub fn validate(&self) -> EngineResult<()> {
        if self.kendall_max_samples < 2 || self.dcor_max_samples < 2 {
            return Err(EngineError::ConfigError(format!(
                "sampling caps must be >= 2 (kendall={}, dcor={})",
                self.kendall_max_samples, self.dcor_max_samples
            )));
        }

        if self.mi_bins < 2 {
            return Err(EngineError::ConfigError(format!(
                "mi_bins must be >= 2 (got {})",
                self.mi_bins
            )));
        }

        Ok(())
    }
}

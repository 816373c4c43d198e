//! Root configuration for the density engine.
//!
//! `EngineConfig` aggregates the cache, grid, scoring and worker-pool
//! sections. Every section has serde defaults, so an empty TOML document is a
//! valid configuration.
//!
//! # TOML Structure
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 512
//! ttl_seconds = 600
//!
//! [grid]
//! default_bins_x = 64
//! default_bins_y = 64
//! epsilon = 1e-9
//!
//! [scoring]
//! kendall_max_samples = 2000
//! mi_bins = 16
//!
//! [batch]
//! worker_threads = 0
//! ```
//!
//! Invalid configuration returns an error; it is never silently defaulted.

mod batch;
mod cache;
mod grid;
mod scoring;

pub use batch::BatchConfig;
pub use cache::CacheConfig;
pub use grid::{GridConfig, CANONICAL_MIN_BINS, DEFAULT_EPSILON, MIN_BINS};
pub use scoring::ScoringConfig;

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{EngineError, EngineResult};

/// Root configuration for the engine facade.
///
/// # Example
///
/// ```
/// use cohort_density_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// config.validate().expect("Defaults should be valid");
/// assert!(config.cache.enabled);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Density cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Grid defaults
    #[serde(default)]
    pub grid: GridConfig,

    /// Pair-scorer limits
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub batch: BatchConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if the file cannot be read, parsed or validated
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| {
            EngineError::ConfigError(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from a TOML string (not validated).
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if TOML parsing fails
    pub fn from_toml_str(toml: &str) -> EngineResult<Self> {
        toml::from_str(toml)
            .map_err(|e| EngineError::ConfigError(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    /// - `EngineError::Serialization` if serialization fails
    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Serialization(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Validate all sections, returning the first error found.
    pub fn validate(&self) -> EngineResult<()> {
        let sections: [(&str, EngineResult<()>); 4] = [
            ("cache", self.cache.validate()),
            ("grid", self.grid.validate()),
            ("scoring", self.scoring.validate()),
            ("batch", self.batch.validate()),
        ];

        for (name, result) in sections {
            if let Err(e) = result {
                let message = match e {
                    EngineError::ConfigError(message) => message,
                    other => other.to_string(),
                };
                error!("EngineConfig validation failed: [{}] {}", name, message);
                return Err(EngineError::ConfigError(format!("[{}] {}", name, message)));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides. Prefix: `COHORT_DENSITY_`
    ///
    /// | Variable | Config Path | Type |
    /// |----------|-------------|------|
    /// | `COHORT_DENSITY_CACHE_ENABLED` | `cache.enabled` | bool |
    /// | `COHORT_DENSITY_CACHE_MAX_ENTRIES` | `cache.max_entries` | usize |
    /// | `COHORT_DENSITY_CACHE_TTL_SECONDS` | `cache.ttl_seconds` | u64 |
    /// | `COHORT_DENSITY_GRID_DEFAULT_BINS` | `grid.default_bins_x/y` | usize |
    /// | `COHORT_DENSITY_SCORING_MI_BINS` | `scoring.mi_bins` | usize |
    /// | `COHORT_DENSITY_WORKER_THREADS` | `batch.worker_threads` | usize |
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(b) = env_parse::<bool>("COHORT_DENSITY_CACHE_ENABLED") {
            self.cache.enabled = b;
        }
        if let Some(n) = env_parse::<usize>("COHORT_DENSITY_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = n;
        }
        if let Some(n) = env_parse::<u64>("COHORT_DENSITY_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = Some(n);
        }
        if let Some(n) = env_parse::<usize>("COHORT_DENSITY_GRID_DEFAULT_BINS") {
            self.grid.default_bins_x = n;
            self.grid.default_bins_y = n;
        }
        if let Some(n) = env_parse::<usize>("COHORT_DENSITY_SCORING_MI_BINS") {
            self.scoring.mi_bins = n;
        }
        if let Some(n) = env_parse::<usize>("COHORT_DENSITY_WORKER_THREADS") {
            self.batch.worker_threads = n;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 512);
        assert_eq!(config.cache.ttl_seconds, None);
        assert_eq!(config.grid.default_bins_x, 64);
        assert_eq!(config.scoring.mi_bins, 16);
        assert_eq!(config.batch.worker_threads, 0);
        assert!(config.batch.effective_threads() >= 1);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty TOML is valid");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[cache]
max_entries = 10
ttl_seconds = 30

[batch]
worker_threads = 3
"#;
        let config = EngineConfig::from_toml_str(toml).expect("valid TOML");
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.ttl_seconds, Some(30));
        assert!(config.cache.enabled);
        assert_eq!(config.batch.effective_threads(), 3);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = EngineConfig::default();
        config.cache.ttl_seconds = Some(120);
        config.grid.epsilon = 1e-6;
        let text = config.to_toml_string().expect("serializes");
        let back = EngineConfig::from_toml_str(&text).expect("parses");
        assert_eq!(config, back);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[cache\nmax_entries = ").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validation_reports_section() {
        let mut config = EngineConfig::default();
        config.scoring.mi_bins = 1;
        let err = config.validate().unwrap_err();
        println!("AFTER: validation error = {}", err);
        assert!(err.to_string().contains("[scoring]"));

        let mut config = EngineConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().unwrap_err().to_string().contains("[cache]"));

        let mut config = EngineConfig::default();
        config.grid.robust_low_percentile = 90.0;
        config.grid.robust_high_percentile = 10.0;
        assert!(config.validate().unwrap_err().to_string().contains("[grid]"));

        let mut config = EngineConfig::default();
        config.cache.ttl_seconds = Some(0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.batch.worker_threads = 5000;
        assert!(config.validate().unwrap_err().to_string().contains("[batch]"));
    }

    #[test]
    fn test_disabled_cache_allows_zero_entries() {
        let mut config = EngineConfig::default();
        config.cache.enabled = false;
        config.cache.max_entries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "[grid]\ndefault_bins_x = 32\ndefault_bins_y = 16").expect("write");
        let config = EngineConfig::from_file(file.path()).expect("loads");
        assert_eq!(config.grid.default_bins_x, 32);
        assert_eq!(config.grid.default_bins_y, 16);
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "[grid]\ndefault_bins_x = 1").expect("write");
        let err = EngineConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("[grid]"));
    }

    #[test]
    fn test_from_missing_file() {
        let err = EngineConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("COHORT_DENSITY_CACHE_MAX_ENTRIES", "77");
        env::set_var("COHORT_DENSITY_WORKER_THREADS", "not-a-number");
        let config = EngineConfig::default().with_env_overrides();
        env::remove_var("COHORT_DENSITY_CACHE_MAX_ENTRIES");
        env::remove_var("COHORT_DENSITY_WORKER_THREADS");

        assert_eq!(config.cache.max_entries, 77);
        assert_eq!(config.batch.worker_threads, 0);
    }
}

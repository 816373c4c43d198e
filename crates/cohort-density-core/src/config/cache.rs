//! Density cache configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Configuration for the density cache.
///
/// Controls how many computed surfaces are retained, how long they stay
/// valid, and how dataset fingerprints are sampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the engine facade creates a cache at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of cached density results before LRU eviction.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Time-to-live for cache entries (seconds). `None` means no expiration.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,

    /// Maximum number of rows sampled when fingerprinting a dataset.
    #[serde(default = "default_fingerprint_rows")]
    pub fingerprint_max_rows: usize,

    /// Maximum number of columns sampled per row when fingerprinting.
    #[serde(default = "default_fingerprint_cols")]
    pub fingerprint_max_cols: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    512
}

fn default_fingerprint_rows() -> usize {
    256
}

fn default_fingerprint_cols() -> usize {
    64
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_max_entries(),
            ttl_seconds: None,
            fingerprint_max_rows: default_fingerprint_rows(),
            fingerprint_max_cols: default_fingerprint_cols(),
        }
    }
}

impl CacheConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if enabled but max_entries is 0
    /// - `EngineError::ConfigError` if ttl_seconds is `Some(0)`
    /// - `EngineError::ConfigError` if either fingerprint sample bound is 0
    pub fn validate(&self) -> EngineResult<()> {
        if self.enabled && self.max_entries == 0 {
            return Err(EngineError::ConfigError(
                "max_entries must be > 0 when cache is enabled".to_string(),
            ));
        }

        if self.ttl_seconds == Some(0) {
            return Err(EngineError::ConfigError(
                "ttl_seconds must be > 0 when set (omit it to disable expiration)".to_string(),
            ));
        }

        if self.fingerprint_max_rows == 0 || self.fingerprint_max_cols == 0 {
            return Err(EngineError::ConfigError(
                "fingerprint_max_rows and fingerprint_max_cols must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

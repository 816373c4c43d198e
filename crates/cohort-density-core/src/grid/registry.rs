//! Named lookup of grid policies.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::policy::{CanonicalGridPolicy, GridMode};
use crate::config::GridConfig;
use crate::error::EngineResult;

/// Policy returned for unknown ids: exact data min/max.
pub const DEFAULT_POLICY_ID: &str = "default";
/// Always `(0, 1)`.
pub const FIXED01_POLICY_ID: &str = "fixed01";
/// Exact data min/max.
pub const MINMAX_POLICY_ID: &str = "minmax";
/// Percentile-trimmed data range from [`GridConfig`].
pub const ROBUST_POLICY_ID: &str = "robust";

/// Thread-safe registry of [`CanonicalGridPolicy`] values by id.
///
/// Lookups of unknown ids return the `"default"` policy.
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Arc<CanonicalGridPolicy>>>,
    default: Arc<CanonicalGridPolicy>,
}

impl PolicyRegistry {
    /// Registry holding the four built-in policies.
    ///
    /// # Errors
    /// `EngineError::ConfigError` if `config` fails validation.
    pub fn with_defaults(config: &GridConfig) -> EngineResult<Self> {
        config.validate()?;

        let build = |id: &str, mode: GridMode| {
            CanonicalGridPolicy::builder(id)
                .mode(mode)
                .default_bins(config.default_bins_x, config.default_bins_y)
                .epsilon(config.epsilon)
                .build()
                .map(Arc::new)
        };

        let default = build(DEFAULT_POLICY_ID, GridMode::DataMinMax)?;
        let mut policies = HashMap::new();
        policies.insert(DEFAULT_POLICY_ID.to_string(), Arc::clone(&default));
        policies.insert(
            MINMAX_POLICY_ID.to_string(),
            build(MINMAX_POLICY_ID, GridMode::DataMinMax)?,
        );
        policies.insert(
            FIXED01_POLICY_ID.to_string(),
            build(FIXED01_POLICY_ID, GridMode::Fixed01)?,
        );
        policies.insert(
            ROBUST_POLICY_ID.to_string(),
            build(
                ROBUST_POLICY_ID,
                GridMode::RobustPercentile {
                    low: config.robust_low_percentile,
                    high: config.robust_high_percentile,
                },
            )?,
        );

        debug!(count = policies.len(), "policy registry initialised");
        Ok(Self {
            policies: RwLock::new(policies),
            default,
        })
    }

    /// Register (or replace) a policy under its own id.
    ///
    /// Replacing `"default"` also changes the fallback for unknown ids.
    pub fn register(&mut self, policy: CanonicalGridPolicy) -> Arc<CanonicalGridPolicy> {
        let policy = Arc::new(policy);
        if policy.id() == DEFAULT_POLICY_ID {
            self.default = Arc::clone(&policy);
        }
        self.insert(Arc::clone(&policy));
        policy
    }

    /// Register through a shared reference. Cannot replace the fallback policy.
    pub fn insert(&self, policy: Arc<CanonicalGridPolicy>) {
        info!(policy = policy.id(), mode = %policy.mode(), "registered grid policy");
        self.policies
            .write()
            .insert(policy.id().to_string(), policy);
    }

    /// Policy for `id`, falling back to `"default"` when unknown.
    pub fn get(&self, id: &str) -> Arc<CanonicalGridPolicy> {
        match self.get_exact(id) {
            Some(policy) => policy,
            None => {
                debug!(requested = id, "unknown policy id, using default");
                Arc::clone(&self.default)
            }
        }
    }

    /// Policy for `id` with no fallback.
    pub fn get_exact(&self, id: &str) -> Option<Arc<CanonicalGridPolicy>> {
        self.policies.read().get(id).cloned()
    }

    /// The fallback policy.
    pub fn default_policy(&self) -> Arc<CanonicalGridPolicy> {
        Arc::clone(&self.default)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.policies.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

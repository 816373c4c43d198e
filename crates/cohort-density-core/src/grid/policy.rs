//! CanonicalGridPolicy: named rules for deriving axis bounds.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::{finite_min_max, percentile, widen_degenerate};
use crate::config::{DEFAULT_EPSILON, MIN_BINS};
use crate::distance::MetricRegistry;
use crate::error::{EngineError, EngineResult};
use crate::scalar::extract_column;
use crate::types::{AxisKey, AxisSpec, Cohort};

/// Range used when an axis has no finite data at all.
const EMPTY_RANGE: (f64, f64) = (0.0, 1.0);

/// How a policy derives an axis range from data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum GridMode {
    /// Always `(0, 1)`.
    Fixed01,
    /// Exact min/max of the extracted scalars.
    DataMinMax,
    /// Linear-interpolated `low`/`high` percentiles (0..=100).
    RobustPercentile { low: f64, high: f64 },
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed01 => f.write_str("fixed01"),
            Self::DataMinMax => f.write_str("minmax"),
            Self::RobustPercentile { low, high } => write!(f, "percentile[{},{}]", low, high),
        }
    }
}

/// Explicit per-axis bounds and bin count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AxisOverride {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub bins: Option<usize>,
}

impl AxisOverride {
    /// Override with both bounds set.
    #[must_use]
    pub fn bounds(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            bins: None,
        }
    }

    #[must_use]
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = Some(bins);
        self
    }

    fn full_bounds(&self) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Named policy describing how canonical grid bounds are derived.
///
/// The per-dataset range cache is safe for concurrent `range_for` calls.
pub struct CanonicalGridPolicy {
    id: String,
    mode: GridMode,
    default_bins_x: usize,
    default_bins_y: usize,
    epsilon: f64,
    overrides: HashMap<AxisKey, AxisOverride>,
    range_cache: RwLock<HashMap<(String, AxisKey), (f64, f64)>>,
}

impl fmt::Debug for CanonicalGridPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalGridPolicy")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("default_bins", &(self.default_bins_x, self.default_bins_y))
            .field("epsilon", &self.epsilon)
            .field("overrides", &self.overrides.len())
            .field("cached_ranges", &self.range_cache.read().len())
            .finish()
    }
}

impl CanonicalGridPolicy {
    /// Start building a policy with the given id.
    pub fn builder(id: impl Into<String>) -> CanonicalGridPolicyBuilder {
        CanonicalGridPolicyBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> GridMode {
        self.mode
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn default_bins(&self) -> (usize, usize) {
        (self.default_bins_x, self.default_bins_y)
    }

    pub fn override_for(&self, axis: &AxisSpec) -> Option<&AxisOverride> {
        self.overrides.get(&axis.key())
    }

    /// Bin count for `axis`: its override if present, else `fallback`.
    pub fn bins_for(&self, axis: &AxisSpec, fallback: usize) -> usize {
        self.override_for(axis)
            .and_then(|o| o.bins)
            .unwrap_or(fallback)
            .max(MIN_BINS)
    }

    /// Range of `axis` over `cohort`; `(0, 1)` when the cohort has no finite data.
    pub fn range_for(
        &self,
        cohort: &Cohort,
        axis: &AxisSpec,
        metrics: &MetricRegistry,
        dataset_key: Option<&str>,
    ) -> (f64, f64) {
        self.try_range_for(cohort, axis, metrics, dataset_key)
            .unwrap_or(EMPTY_RANGE)
    }

    /// Range of `axis` over `cohort`, or `None` when a data-driven mode finds
    /// no finite values and no full override applies.
    ///
    /// Results are cached per `(dataset_key, axis)` when a key is supplied.
    pub fn try_range_for(
        &self,
        cohort: &Cohort,
        axis: &AxisSpec,
        metrics: &MetricRegistry,
        dataset_key: Option<&str>,
    ) -> Option<(f64, f64)> {
        let axis_key = axis.key();
        let over = self.overrides.get(&axis_key).copied().unwrap_or_default();
        if let Some((min, max)) = over.full_bounds() {
            return Some(widen_degenerate(min, max, self.epsilon));
        }

        if let Some(key) = dataset_key {
            let cached = self
                .range_cache
                .read()
                .get(&(key.to_string(), axis_key.clone()))
                .copied();
            if cached.is_some() {
                return cached;
            }
        }

        let computed = self.compute_range(cohort, axis, metrics)?;
        let (min, max) = widen_degenerate(
            over.min.unwrap_or(computed.0),
            over.max.unwrap_or(computed.1),
            self.epsilon,
        );

        if let Some(key) = dataset_key {
            self.range_cache
                .write()
                .insert((key.to_string(), axis_key), (min, max));
        }
        Some((min, max))
    }

    fn compute_range(
        &self,
        cohort: &Cohort,
        axis: &AxisSpec,
        metrics: &MetricRegistry,
    ) -> Option<(f64, f64)> {
        match self.mode {
            GridMode::Fixed01 => Some((0.0, 1.0)),
            GridMode::DataMinMax => finite_min_max(&extract_column(cohort, axis, metrics)),
            GridMode::RobustPercentile { low, high } => {
                let mut values: Vec<f64> = extract_column(cohort, axis, metrics)
                    .into_iter()
                    .filter(|v| v.is_finite())
                    .collect();
                values.sort_by(f64::total_cmp);
                Some((percentile(&values, low)?, percentile(&values, high)?))
            }
        }
    }

    /// Compute and cache ranges for every axis under one dataset key.
    pub fn prewarm(
        &self,
        cohort: &Cohort,
        axes: &[AxisSpec],
        metrics: &MetricRegistry,
        dataset_key: &str,
    ) {
        for axis in axes {
            let _ = self.try_range_for(cohort, axis, metrics, Some(dataset_key));
        }
        debug!(
            policy = %self.id,
            dataset = dataset_key,
            axes = axes.len(),
            "prewarmed canonical range cache"
        );
    }

    /// Number of cached `(dataset, axis)` ranges.
    pub fn cached_range_count(&self) -> usize {
        self.range_cache.read().len()
    }

    /// Drop every cached range.
    pub fn clear_range_cache(&self) {
        self.range_cache.write().clear();
    }
}

/// Validating builder for [`CanonicalGridPolicy`].
#[derive(Debug, Clone)]
pub struct CanonicalGridPolicyBuilder {
    id: String,
    mode: GridMode,
    default_bins_x: usize,
    default_bins_y: usize,
    epsilon: f64,
    overrides: HashMap<AxisKey, AxisOverride>,
}

impl CanonicalGridPolicyBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: GridMode::DataMinMax,
            default_bins_x: 64,
            default_bins_y: 64,
            epsilon: DEFAULT_EPSILON,
            overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: GridMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn default_bins(mut self, bins_x: usize, bins_y: usize) -> Self {
        self.default_bins_x = bins_x;
        self.default_bins_y = bins_y;
        self
    }

    #[must_use]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn override_axis(mut self, axis: &AxisSpec, over: AxisOverride) -> Self {
        self.overrides.insert(axis.key(), over);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    /// `EngineError::ConfigError` if the id is blank, bins < 2, epsilon is not
    /// finite and positive, percentiles are out of order, or an override has
    /// non-finite bounds, `min > max`, or fewer than 2 bins.
    pub fn build(self) -> EngineResult<CanonicalGridPolicy> {
        if self.id.trim().is_empty() {
            return Err(EngineError::ConfigError("policy id must not be blank".into()));
        }
        if self.default_bins_x < MIN_BINS || self.default_bins_y < MIN_BINS {
            return Err(EngineError::ConfigError(format!(
                "policy '{}': default bins must be >= {}",
                self.id, MIN_BINS
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(EngineError::ConfigError(format!(
                "policy '{}': epsilon must be finite and > 0",
                self.id
            )));
        }
        if let GridMode::RobustPercentile { low, high } = self.mode {
            if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
                return Err(EngineError::ConfigError(format!(
                    "policy '{}': percentiles must satisfy 0 <= low < high <= 100 (got {}, {})",
                    self.id, low, high
                )));
            }
        }
        for (key, over) in &self.overrides {
            let bad_bound = [over.min, over.max]
                .iter()
                .flatten()
                .any(|b| !b.is_finite());
            let inverted = matches!(over.full_bounds(), Some((min, max)) if min > max);
            let bad_bins = over.bins.is_some_and(|b| b < MIN_BINS);
            if bad_bound || inverted || bad_bins {
                return Err(EngineError::ConfigError(format!(
                    "policy '{}': invalid override for axis {}: {:?}",
                    self.id, key, over
                )));
            }
        }

        Ok(CanonicalGridPolicy {
            id: self.id,
            mode: self.mode,
            default_bins_x: self.default_bins_x,
            default_bins_y: self.default_bins_y,
            epsilon: self.epsilon,
            overrides: self.overrides,
            range_cache: RwLock::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort() -> Cohort {
        let rows = (0..=100).map(|i| vec![i as f64, 5.0]).collect();
        Cohort::new("A", rows).expect("valid")
    }

    #[test]
    fn test_modes() {
        let metrics = MetricRegistry::with_builtins();
        let cohort = cohort();
        let axis = AxisSpec::component(0);

        let fixed = CanonicalGridPolicy::builder("f")
            .mode(GridMode::Fixed01)
            .build()
            .expect("valid");
        assert_eq!(fixed.range_for(&cohort, &axis, &metrics, None), (0.0, 1.0));

        let minmax = CanonicalGridPolicy::builder("m").build().expect("valid");
        assert_eq!(minmax.range_for(&cohort, &axis, &metrics, None), (0.0, 100.0));

        let robust = CanonicalGridPolicy::builder("r")
            .mode(GridMode::RobustPercentile { low: 5.0, high: 95.0 })
            .build()
            .expect("valid");
        assert_eq!(robust.range_for(&cohort, &axis, &metrics, None), (5.0, 95.0));
    }

    #[test]
    fn test_degenerate_span_widened() {
        let metrics = MetricRegistry::with_builtins();
        let policy = CanonicalGridPolicy::builder("m")
            .epsilon(0.25)
            .build()
            .expect("valid");
        let range = policy.range_for(&cohort(), &AxisSpec::component(1), &metrics, None);
        assert_eq!(range, (5.0, 5.25));
    }

    #[test]
    fn test_override_wins() {
        let metrics = MetricRegistry::with_builtins();
        let axis = AxisSpec::component(0);
        let policy = CanonicalGridPolicy::builder("o")
            .override_axis(&axis, AxisOverride::bounds(-5.0, 8.0).with_bins(32))
            .build()
            .expect("valid");
        assert_eq!(policy.range_for(&cohort(), &axis, &metrics, None), (-5.0, 8.0));
        assert_eq!(policy.bins_for(&axis, 64), 32);
        assert_eq!(policy.bins_for(&AxisSpec::component(1), 64), 64);
    }

    #[test]
    fn test_partial_override_applies_one_side() {
        let metrics = MetricRegistry::with_builtins();
        let axis = AxisSpec::component(0);
        let policy = CanonicalGridPolicy::builder("p")
            .override_axis(
                &axis,
                AxisOverride {
                    min: Some(-10.0),
                    ..AxisOverride::default()
                },
            )
            .build()
            .expect("valid");
        assert_eq!(policy.range_for(&cohort(), &axis, &metrics, None), (-10.0, 100.0));
    }

    #[test]
    fn test_range_cache_and_prewarm() {
        let metrics = MetricRegistry::with_builtins();
        let policy = CanonicalGridPolicy::builder("m").build().expect("valid");
        let axes = [AxisSpec::component(0), AxisSpec::component(1)];
        policy.prewarm(&cohort(), &axes, &metrics, "ds-1");
        assert_eq!(policy.cached_range_count(), 2);

        // A different cohort under the same key returns the cached range.
        let other = Cohort::new("B", vec![vec![500.0, 1.0]]).expect("valid");
        assert_eq!(
            policy.range_for(&other, &axes[0], &metrics, Some("ds-1")),
            (0.0, 100.0)
        );
        policy.clear_range_cache();
        assert_eq!(policy.cached_range_count(), 0);
    }

    #[test]
    fn test_empty_cohort_range() {
        let metrics = MetricRegistry::with_builtins();
        let policy = CanonicalGridPolicy::builder("m").build().expect("valid");
        let empty = Cohort::empty("none");
        assert_eq!(policy.try_range_for(&empty, &AxisSpec::Mean, &metrics, None), None);
        assert_eq!(policy.range_for(&empty, &AxisSpec::Mean, &metrics, None), (0.0, 1.0));
    }

    #[test]
    fn test_builder_validation() {
        assert!(CanonicalGridPolicy::builder(" ").build().is_err());
        assert!(CanonicalGridPolicy::builder("x").default_bins(1, 4).build().is_err());
        assert!(CanonicalGridPolicy::builder("x").epsilon(0.0).build().is_err());
        assert!(CanonicalGridPolicy::builder("x")
            .mode(GridMode::RobustPercentile { low: 60.0, high: 40.0 })
            .build()
            .is_err());
        assert!(CanonicalGridPolicy::builder("x")
            .override_axis(&AxisSpec::Mean, AxisOverride::bounds(2.0, 1.0))
            .build()
            .is_err());
        assert!(CanonicalGridPolicy::builder("x")
            .override_axis(&AxisSpec::Mean, AxisOverride::default().with_bins(1))
            .build()
            .is_err());
    }
}

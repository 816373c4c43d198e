//! A/B comparison of two cohorts on one shared canonical grid.
//!
//! Both densities are computed on the same `GridSpec` so their cells line up
//! one to one. Under `DataMinMax` and `CanonicalByFeature` the grid spans the
//! union of the two cohorts' ranges, so neither cohort's mass is clipped by
//! the other's tighter range.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::{DatasetKey, DensityCache};
use crate::config::{CacheConfig, CANONICAL_MIN_BINS};
use crate::density::DensityEngine;
use crate::error::{EngineError, EngineResult};
use crate::grid::{finite_min_max, union_range, widen_degenerate, PolicyRegistry};
use crate::provenance::{Alignment, DataSummary, Operation, Provenance, SurfaceKind};
use crate::recipe::{BoundsPolicy, Recipe};
use crate::scalar::extract_column;
use crate::types::{AxisSpec, Cohort, DensityResult, Grid2, GridSpec};

/// Result of comparing cohort A against cohort B.
#[derive(Debug, Clone)]
pub struct AbComparison {
    pub grid: GridSpec,
    pub alignment: Alignment,
    pub density_a: Arc<DensityResult>,
    pub density_b: Arc<DensityResult>,
    /// `A - B` per cell; present when the recipe asks for PDF output.
    pub pdf_diff: Option<Grid2>,
    /// `A - B` per cell; present when the recipe asks for CDF output.
    pub cdf_diff: Option<Grid2>,
    pub provenance_a: Provenance,
    pub provenance_b: Provenance,
    pub provenance_diff: Option<Provenance>,
    pub from_cache_a: bool,
    pub from_cache_b: bool,
}

/// Computes aligned densities and signed differences for two cohorts.
#[derive(Debug, Clone)]
pub struct AbComparisonEngine {
    density: DensityEngine,
    policies: Arc<PolicyRegistry>,
    fingerprint_sampling: (usize, usize),
}

impl AbComparisonEngine {
    pub fn new(density: DensityEngine, policies: Arc<PolicyRegistry>) -> Self {
        let defaults = CacheConfig::default();
        Self {
            density,
            policies,
            fingerprint_sampling: (defaults.fingerprint_max_rows, defaults.fingerprint_max_cols),
        }
    }

    /// Row/column caps used to fingerprint cohorts for the policy range cache.
    #[must_use]
    pub fn with_fingerprint_sampling(mut self, max_rows: usize, max_cols: usize) -> Self {
        self.fingerprint_sampling = (max_rows, max_cols);
        self
    }

    pub fn density_engine(&self) -> &DensityEngine {
        &self.density
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    fn dataset_key(&self, cohort: &Cohort) -> DatasetKey {
        DatasetKey::for_cohort(cohort, self.fingerprint_sampling.0, self.fingerprint_sampling.1)
    }

    /// The shared grid for `a` and `b` under the recipe's bounds policy.
    /// Bin counts are raised to at least 5.
    ///
    /// # Errors
    /// `EngineError::DimensionMismatch` if both cohorts are non-empty and
    /// differ in dimensionality.
    pub fn canonical_grid(
        &self,
        a: &Cohort,
        b: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        recipe: &Recipe,
    ) -> EngineResult<(GridSpec, Alignment)> {
        check_dimensions(a, b)?;
        let (bins_x, bins_y) = recipe.bins();
        let epsilon = self.density.epsilon();

        let (grid, alignment) = match recipe.bounds_policy() {
            BoundsPolicy::Fixed01 => (GridSpec::unit(bins_x, bins_y), Alignment::Fixed01),
            BoundsPolicy::DataMinMax => {
                let data_range = |axis: &AxisSpec| {
                    let ra = finite_min_max(&extract_column(a, axis, self.density.metrics()));
                    let rb = finite_min_max(&extract_column(b, axis, self.density.metrics()));
                    let (min, max) = match (ra, rb) {
                        (Some(ra), Some(rb)) => union_range(ra, rb),
                        (Some(r), None) | (None, Some(r)) => r,
                        (None, None) => (0.0, 1.0),
                    };
                    widen_degenerate(min, max, epsilon)
                };
                let (min_x, max_x) = data_range(x_axis);
                let (min_y, max_y) = data_range(y_axis);
                (
                    GridSpec::new(bins_x, bins_y)
                        .with_x_bounds(min_x, max_x)
                        .with_y_bounds(min_y, max_y),
                    Alignment::UnionOfRanges,
                )
            }
            BoundsPolicy::CanonicalByFeature => {
                let id = recipe.canonical_policy_id().unwrap_or_default();
                let policy = self.policies.get(id);
                let key_a = self.dataset_key(a).to_string();
                let key_b = self.dataset_key(b).to_string();
                let metrics = self.density.metrics();
                let policy_range = |axis: &AxisSpec| {
                    let ra = (!a.is_empty())
                        .then(|| policy.try_range_for(a, axis, metrics, Some(&key_a)))
                        .flatten();
                    let rb = (!b.is_empty())
                        .then(|| policy.try_range_for(b, axis, metrics, Some(&key_b)))
                        .flatten();
                    let (min, max) = match (ra, rb) {
                        (Some(ra), Some(rb)) => union_range(ra, rb),
                        (Some(r), None) | (None, Some(r)) => r,
                        (None, None) => policy.range_for(a, axis, metrics, None),
                    };
                    widen_degenerate(min, max, policy.epsilon())
                };
                let (min_x, max_x) = policy_range(x_axis);
                let (min_y, max_y) = policy_range(y_axis);
                (
                    GridSpec::new(policy.bins_for(x_axis, bins_x), policy.bins_for(y_axis, bins_y))
                        .with_x_bounds(min_x, max_x)
                        .with_y_bounds(min_y, max_y),
                    Alignment::CanonicalPolicy(policy.id().to_string()),
                )
            }
        };
        Ok((grid.with_min_bins(CANONICAL_MIN_BINS), alignment))
    }

    /// Compare `a` against `b` on `(x_axis, y_axis)`.
    ///
    /// Densities go through `cache` when one is supplied and the recipe
    /// enables caching. Signed `A - B` differences are produced only for the
    /// surfaces the recipe's output kind requests.
    ///
    /// # Errors
    /// `EngineError::DimensionMismatch` if the cohorts disagree on dimensionality.
    pub fn compare(
        &self,
        a: &Cohort,
        b: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        recipe: &Recipe,
        cache: Option<&DensityCache>,
    ) -> EngineResult<AbComparison> {
        let start = Instant::now();
        let (grid, alignment) = self.canonical_grid(a, b, x_axis, y_axis, recipe)?;
        let cache = cache.filter(|_| recipe.use_cache());

        let (density_a, provenance_a, from_cache_a) =
            self.aligned_density(a, x_axis, y_axis, &grid, &alignment, recipe, cache);
        let (density_b, provenance_b, from_cache_b) =
            self.aligned_density(b, x_axis, y_axis, &grid, &alignment, recipe, cache);

        let output = recipe.output_kind();
        let pdf_diff = output
            .wants_pdf()
            .then(|| signed_difference(&density_a.pdf, &density_b.pdf));
        let cdf_diff = output
            .wants_cdf()
            .then(|| signed_difference(&density_a.cdf, &density_b.cdf));

        let provenance_diff = (pdf_diff.is_some() || cdf_diff.is_some()).then(|| {
            Provenance::builder(Operation::Difference, SurfaceKind::ComparisonSigned)
                .axes(x_axis, y_axis)
                .grid(grid)
                .alignment(alignment.clone())
                .recipe_name(Some(recipe.name()))
                .cohort_label(a.label())
                .cohort_label(b.label())
                .compute_millis(start.elapsed().as_millis() as u64)
                .build()
        });

        debug!(
            a = a.label(),
            b = b.label(),
            grid = %grid,
            alignment = %alignment,
            from_cache_a,
            from_cache_b,
            "compared cohorts"
        );

        Ok(AbComparison {
            grid,
            alignment,
            density_a,
            density_b,
            pdf_diff,
            cdf_diff,
            provenance_a,
            provenance_b,
            provenance_diff,
            from_cache_a,
            from_cache_b,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn aligned_density(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
        alignment: &Alignment,
        recipe: &Recipe,
        cache: Option<&DensityCache>,
    ) -> (Arc<DensityResult>, Provenance, bool) {
        let dataset_key = match cache {
            Some(c) => c.dataset_key(cohort),
            None => self.dataset_key(cohort),
        };
        let baseline = || {
            Provenance::builder(Operation::Baseline, recipe.output_kind().surface_kind())
                .axes(x_axis, y_axis)
                .grid(grid)
                .alignment(alignment.clone())
                .recipe_name(Some(recipe.name()))
                .data_summary(DataSummary {
                    dataset_key: dataset_key.to_string(),
                    n_samples: cohort.len(),
                    dimension: cohort.dimension(),
                })
                .cohort_label(cohort.label())
        };

        match cache {
            Some(cache) => {
                let out = cache.get_or_compute_for_request(cohort, x_axis, y_axis, grid, &baseline);
                let provenance = out.provenance.unwrap_or_else(|| baseline().build());
                (out.density, provenance, out.from_cache)
            }
            None => {
                let started = Instant::now();
                let computation = self.density.compute_with_checks(cohort, x_axis, y_axis, grid);
                let provenance = baseline()
                    .numeric_checks(computation.checks)
                    .compute_millis(started.elapsed().as_millis() as u64)
                    .build();
                (Arc::new(computation.result), provenance, false)
            }
        }
    }
}

fn check_dimensions(a: &Cohort, b: &Cohort) -> EngineResult<()> {
    if !a.is_empty() && !b.is_empty() && a.dimension() != b.dimension() {
        return Err(EngineError::DimensionMismatch {
            expected: a.dimension(),
            actual: b.dimension(),
        });
    }
    Ok(())
}

/// Elementwise `a - b` over two grids of the same shape.
pub fn signed_difference(a: &Grid2, b: &Grid2) -> Grid2 {
    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x - y).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::distance::MetricRegistry;
    use crate::grid::{AxisOverride, CanonicalGridPolicy, GridMode};
    use crate::recipe::OutputKind;

    fn shifted(label: &str, shift: f64, n: usize) -> Cohort {
        let rows = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                vec![t * 2.0 + shift, (t * 6.0).sin() + shift]
            })
            .collect();
        Cohort::new(label, rows).expect("valid")
    }

    fn engine() -> AbComparisonEngine {
        let policies = PolicyRegistry::with_defaults(&GridConfig::default()).expect("valid");
        AbComparisonEngine::new(DensityEngine::default(), Arc::new(policies))
    }

    fn axes() -> (AxisSpec, AxisSpec) {
        (AxisSpec::component(0), AxisSpec::component(1))
    }

    #[test]
    fn test_data_minmax_grid_is_union() {
        let (x, y) = axes();
        let a = shifted("A", 0.0, 100);
        let b = shifted("B", 3.0, 100);
        let recipe = Recipe::builder("ab").bins(16, 16).build().expect("valid");
        let cmp = engine().compare(&a, &b, &x, &y, &recipe, None).expect("compares");

        let ((min_x, max_x), _) = cmp.density_a.bounds();
        let metrics = MetricRegistry::with_builtins();
        for cohort in [&a, &b] {
            let (lo, hi) = finite_min_max(&extract_column(cohort, &x, &metrics)).expect("data");
            assert!(min_x <= lo && hi <= max_x);
        }
        assert_eq!(cmp.density_a.bounds(), cmp.density_b.bounds());
        assert_eq!(cmp.alignment, Alignment::UnionOfRanges);
        assert!((cmp.density_a.total_mass() - 1.0).abs() < 1e-6);
        assert!((cmp.density_b.total_mass() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bins_raised_to_canonical_minimum() {
        let (x, y) = axes();
        let recipe = Recipe::builder("tiny")
            .bins(2, 3)
            .bounds_policy(BoundsPolicy::Fixed01)
            .build()
            .expect("valid");
        let (grid, alignment) = engine()
            .canonical_grid(&shifted("A", 0.0, 10), &shifted("B", 0.0, 10), &x, &y, &recipe)
            .expect("grid");
        assert_eq!((grid.bins_x(), grid.bins_y()), (5, 5));
        assert_eq!(grid.x_bounds(), (Some(0.0), Some(1.0)));
        assert_eq!(alignment, Alignment::Fixed01);
    }

    #[test]
    fn test_output_kind_controls_diffs() {
        let (x, y) = axes();
        let a = shifted("A", 0.0, 50);
        let b = shifted("B", 0.5, 50);

        let pdf_only = Recipe::builder("pdf")
            .bins(8, 8)
            .output_kind(OutputKind::Pdf)
            .build()
            .expect("valid");
        let cmp = engine().compare(&a, &b, &x, &y, &pdf_only, None).expect("compares");
        assert!(cmp.pdf_diff.is_some());
        assert!(cmp.cdf_diff.is_none());
        let diff = cmp.pdf_diff.expect("pdf diff");
        assert_eq!(diff[3][4], cmp.density_a.pdf[3][4] - cmp.density_b.pdf[3][4]);

        let prov = cmp.provenance_diff.expect("diff provenance");
        assert_eq!(prov.operation, Operation::Difference);
        assert_eq!(prov.surface_kind, SurfaceKind::ComparisonSigned);
        assert_eq!(cmp.provenance_a.operation, Operation::Baseline);
        assert_eq!(cmp.provenance_a.cohort_labels, vec!["A"]);
    }

    #[test]
    fn test_same_cohort_diff_is_zero() {
        let (x, y) = axes();
        let a = shifted("A", 0.0, 80);
        let recipe = Recipe::builder("self").bins(12, 12).build().expect("valid");
        let cmp = engine().compare(&a, &a, &x, &y, &recipe, None).expect("compares");
        assert!(cmp.pdf_diff.expect("pdf").iter().flatten().all(|&d| d == 0.0));
        assert!(cmp.cdf_diff.expect("cdf").iter().flatten().all(|&d| d == 0.0));
    }

    #[test]
    fn test_cache_used_when_enabled() {
        let (x, y) = axes();
        let a = shifted("A", 0.0, 60);
        let b = shifted("B", 1.0, 60);
        let cache =
            DensityCache::new(CacheConfig::default(), DensityEngine::default()).expect("cache");
        let recipe = Recipe::builder("cached").bins(10, 10).build().expect("valid");
        let engine = engine();

        let first = engine.compare(&a, &b, &x, &y, &recipe, Some(&cache)).expect("compares");
        let second = engine.compare(&a, &b, &x, &y, &recipe, Some(&cache)).expect("compares");
        assert!(!first.from_cache_a && !first.from_cache_b);
        assert!(second.from_cache_a && second.from_cache_b);
        assert!(Arc::ptr_eq(&first.density_a, &second.density_a));
        assert_eq!(second.provenance_a.origin, Some(first.provenance_a.id));

        // A hit under another recipe reports that recipe, linked to the stored record.
        let renamed = Recipe::builder("renamed").bins(10, 10).build().expect("valid");
        let again = engine.compare(&a, &b, &x, &y, &renamed, Some(&cache)).expect("compares");
        println!(
            "AFTER: recipe={:?} origin={:?}",
            again.provenance_b.recipe_name, again.provenance_b.origin
        );
        assert!(again.from_cache_b);
        assert_eq!(again.provenance_b.recipe_name.as_deref(), Some("renamed"));
        assert_eq!(again.provenance_b.origin, Some(first.provenance_b.id));

        let uncached = Recipe::builder("uncached")
            .bins(10, 10)
            .use_cache(false)
            .build()
            .expect("valid");
        let third = engine.compare(&a, &b, &x, &y, &uncached, Some(&cache)).expect("compares");
        assert!(!third.from_cache_a);
        assert_eq!(cache.stats().hits, 4);
    }

    #[test]
    fn test_canonical_policy_override_and_bins() {
        let (x, y) = axes();
        let mut registry = PolicyRegistry::with_defaults(&GridConfig::default()).expect("valid");
        registry.register(
            CanonicalGridPolicy::builder("fixed-x")
                .mode(GridMode::DataMinMax)
                .override_axis(&x, AxisOverride::bounds(-5.0, 8.0).with_bins(32))
                .build()
                .expect("valid"),
        );
        let engine = AbComparisonEngine::new(DensityEngine::default(), Arc::new(registry));
        let recipe = Recipe::builder("policy")
            .canonical_policy("fixed-x")
            .bins(16, 16)
            .build()
            .expect("valid");
        let (grid, alignment) = engine
            .canonical_grid(&shifted("A", 0.0, 40), &shifted("B", 2.0, 40), &x, &y, &recipe)
            .expect("grid");
        assert_eq!(grid.bins_x(), 32);
        assert_eq!(grid.bins_y(), 16);
        assert_eq!(grid.x_bounds(), (Some(-5.0), Some(8.0)));
        assert_eq!(alignment, Alignment::CanonicalPolicy("fixed-x".into()));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (x, y) = axes();
        let b = Cohort::new("B", vec![vec![0.0, 1.0, 2.0]]).expect("valid");
        let recipe = Recipe::builder("r").build().expect("valid");
        let err = engine()
            .compare(&shifted("A", 0.0, 5), &b, &x, &y, &recipe, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}

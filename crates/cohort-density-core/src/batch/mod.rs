//! Batch density computation over many axis pairs of one cohort.
//!
//! Two modes share one execution path:
//!
//! - component pairs: score candidate pairs in the recipe's component range,
//!   select by the recipe's pair selection, then compute each surface
//! - whitelist: compute the recipe's explicit axis pairs
//!
//! Jobs run on a per-call worker pool and fail fast. Each job resolves its
//! grid, consults the cache, and computes on a miss. An optional callback sees
//! each result as it completes; a panicking callback is logged and ignored.

mod job;

pub use job::{BatchJobResult, BatchSummary};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::{DatasetKey, DensityCache};
use crate::config::{BatchConfig, CacheConfig};
use crate::density::DensityEngine;
use crate::error::EngineResult;
use crate::grid::{CanonicalGridPolicy, PolicyRegistry};
use crate::parallel::{build_pool, panic_message, run_fail_fast};
use crate::provenance::{Alignment, DataSummary, Operation, Provenance};
use crate::recipe::{BoundsPolicy, PairSelection, Recipe};
use crate::scoring::PairScorer;
use crate::types::{AxisSpec, Cohort, GridSpec};
use job::BatchJob;

/// Per-result callback, invoked from worker threads as jobs complete.
pub type ResultCallback<'a> = &'a (dyn Fn(&BatchJobResult) + Send + Sync);

/// Runs recipe-driven batches of density computations.
#[derive(Debug, Clone)]
pub struct BatchEngine {
    density: DensityEngine,
    policies: Arc<PolicyRegistry>,
    scorer: PairScorer,
    cache: Option<Arc<DensityCache>>,
    batch: BatchConfig,
    fingerprint_sampling: (usize, usize),
}

impl BatchEngine {
    /// `scorer` supplies the metric registry and scoring limits; each run
    /// rebuilds its scoring settings from the recipe.
    pub fn new(
        density: DensityEngine,
        policies: Arc<PolicyRegistry>,
        scorer: PairScorer,
        cache: Option<Arc<DensityCache>>,
        batch: BatchConfig,
    ) -> Self {
        let sampling = cache
            .as_ref()
            .map(|c| c.config().clone())
            .unwrap_or_else(CacheConfig::default);
        Self {
            density,
            policies,
            scorer,
            cache,
            batch,
            fingerprint_sampling: (sampling.fingerprint_max_rows, sampling.fingerprint_max_cols),
        }
    }

    pub fn cache(&self) -> Option<&Arc<DensityCache>> {
        self.cache.as_ref()
    }

    fn dataset_key(&self, cohort: &Cohort) -> DatasetKey {
        match &self.cache {
            Some(cache) => cache.dataset_key(cohort),
            None => DatasetKey::for_cohort(
                cohort,
                self.fingerprint_sampling.0,
                self.fingerprint_sampling.1,
            ),
        }
    }

    /// Score, select and compute component-pair surfaces.
    ///
    /// `Whitelist` recipes select nothing in this mode; use
    /// [`run_whitelist`](Self::run_whitelist).
    ///
    /// # Errors
    /// `EngineError::ThreadPool` or `EngineError::Aborted` (first job failure).
    pub fn run_component_pairs(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        callback: Option<ResultCallback<'_>>,
    ) -> EngineResult<BatchSummary> {
        let scorer = self.scorer.with_config(recipe.scorer_config(&self.scorer.config().limits));
        let (start, end) = recipe.component_range();
        let scores = scorer.score_components(cohort, start, end);

        let selected: Vec<_> = match recipe.pair_selection() {
            PairSelection::All => scores.into_iter().enumerate().collect(),
            PairSelection::TopKByScore => {
                let k = recipe.top_k().unwrap_or(0);
                scores.into_iter().enumerate().take(k).collect()
            }
            PairSelection::ThresholdByScore => {
                let threshold = recipe.threshold().unwrap_or(0.0);
                scores
                    .into_iter()
                    .enumerate()
                    .filter(|(_, s)| s.score >= threshold)
                    .collect()
            }
            PairSelection::Whitelist => {
                debug!(recipe = recipe.name(), "whitelist recipe selects no component pairs");
                Vec::new()
            }
        };

        let jobs = selected
            .into_iter()
            .filter_map(|(position, s)| Some((position, s.i?, s.j?, s.score)))
            .enumerate()
            .map(|(submission, (position, i, j, score))| BatchJob {
                submission,
                components: Some((i, j)),
                x_axis: AxisSpec::component(i),
                y_axis: AxisSpec::component(j),
                rank: Some(position + 1),
                score: Some(score),
            })
            .collect();

        self.execute(cohort, recipe, jobs, callback)
    }

    /// Compute the recipe's whitelisted axis pairs. Whitelist jobs are
    /// unscored, so results keep submission order.
    ///
    /// # Errors
    /// `EngineError::ThreadPool` or `EngineError::Aborted` (first job failure).
    pub fn run_whitelist(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        callback: Option<ResultCallback<'_>>,
    ) -> EngineResult<BatchSummary> {
        let jobs = recipe
            .whitelist()
            .iter()
            .enumerate()
            .map(|(submission, (x, y))| BatchJob {
                submission,
                components: None,
                x_axis: x.clone(),
                y_axis: y.clone(),
                rank: None,
                score: None,
            })
            .collect();

        self.execute(cohort, recipe, jobs, callback)
    }

    fn execute(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        jobs: Vec<BatchJob>,
        callback: Option<ResultCallback<'_>>,
    ) -> EngineResult<BatchSummary> {
        let started = Instant::now();
        let dataset_key = self.dataset_key(cohort).to_string();
        let submitted = jobs.len();

        let policy = match recipe.bounds_policy() {
            BoundsPolicy::CanonicalByFeature => {
                let policy = self.policies.get(recipe.canonical_policy_id().unwrap_or_default());
                let mut axes: Vec<AxisSpec> = Vec::new();
                for job in &jobs {
                    for axis in [&job.x_axis, &job.y_axis] {
                        if !axes.iter().any(|a| a.key() == axis.key()) {
                            axes.push(axis.clone());
                        }
                    }
                }
                policy.prewarm(cohort, &axes, self.density.metrics(), &dataset_key);
                Some(policy)
            }
            _ => None,
        };

        info!(
            cohort = cohort.label(),
            recipe = recipe.name(),
            dataset = %dataset_key,
            jobs = submitted,
            "batch started"
        );

        let cache = self.cache.as_deref().filter(|_| recipe.use_cache());
        let pool = build_pool(&self.batch)?;
        let mut results = run_fail_fast(&pool, "batch", jobs, |job: BatchJob| {
            let result = self.run_job(cohort, recipe, policy.as_deref(), &dataset_key, cache, job);
            if let Some(callback) = callback {
                notify(callback, &result);
            }
            Ok(result)
        })?;

        results.sort_by(|a, b| {
            b.sort_score()
                .total_cmp(&a.sort_score())
                .then_with(|| a.submission.cmp(&b.submission))
        });

        let cache_hits = results.iter().filter(|r| r.from_cache).count();
        let summary = BatchSummary {
            dataset_key,
            recipe_name: recipe.name().to_string(),
            policy_id: policy.map(|p| p.id().to_string()),
            submitted,
            computed: results.len() - cache_hits,
            cache_hits,
            results,
            wall_millis: started.elapsed().as_millis() as u64,
            cache_stats: cache.map(DensityCache::stats),
        };

        info!(
            recipe = recipe.name(),
            submitted = summary.submitted,
            computed = summary.computed,
            cache_hits = summary.cache_hits,
            wall_ms = summary.wall_millis,
            "batch finished"
        );
        Ok(summary)
    }

    fn run_job(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        policy: Option<&CanonicalGridPolicy>,
        dataset_key: &str,
        cache: Option<&DensityCache>,
        job: BatchJob,
    ) -> BatchJobResult {
        let started = Instant::now();
        let (grid, alignment) = self.resolve_grid(cohort, recipe, policy, dataset_key, &job);

        let request = || {
            Provenance::builder(Operation::Baseline, recipe.output_kind().surface_kind())
                .axes(&job.x_axis, &job.y_axis)
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

        let (density, from_cache, provenance) = match cache {
            Some(cache) => {
                let out = cache.get_or_compute_for_request(
                    cohort,
                    &job.x_axis,
                    &job.y_axis,
                    &grid,
                    &request,
                );
                let prov = out.provenance.unwrap_or_else(|| request().build());
                (out.density, out.from_cache, prov)
            }
            None => {
                let computation =
                    self.density
                        .compute_with_checks(cohort, &job.x_axis, &job.y_axis, &grid);
                let prov = request()
                    .numeric_checks(computation.checks)
                    .compute_millis(started.elapsed().as_millis() as u64)
                    .build();
                (Arc::new(computation.result), false, prov)
            }
        };

        BatchJobResult {
            component_indices: job.components,
            axes: (job.x_axis, job.y_axis),
            grid,
            density,
            rank: job.rank,
            score: job.score,
            from_cache,
            compute_millis: started.elapsed().as_millis() as u64,
            provenance,
            submission: job.submission,
        }
    }

    /// Grid for one job: unit square, data-inferred bounds, or the canonical
    /// policy's cached ranges and bin overrides.
    fn resolve_grid(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        policy: Option<&CanonicalGridPolicy>,
        dataset_key: &str,
        job: &BatchJob,
    ) -> (GridSpec, Alignment) {
        let (bins_x, bins_y) = recipe.bins();
        match (recipe.bounds_policy(), policy) {
            (BoundsPolicy::Fixed01, _) => (GridSpec::unit(bins_x, bins_y), Alignment::Fixed01),
            (BoundsPolicy::CanonicalByFeature, Some(policy)) => {
                let metrics = self.density.metrics();
                let dataset = Some(dataset_key);
                let (min_x, max_x) = policy.range_for(cohort, &job.x_axis, metrics, dataset);
                let (min_y, max_y) = policy.range_for(cohort, &job.y_axis, metrics, dataset);
                let grid = GridSpec::new(
                    policy.bins_for(&job.x_axis, bins_x),
                    policy.bins_for(&job.y_axis, bins_y),
                )
                .with_x_bounds(min_x, max_x)
                .with_y_bounds(min_y, max_y);
                (grid, Alignment::CanonicalPolicy(policy.id().to_string()))
            }
            _ => (GridSpec::new(bins_x, bins_y), Alignment::DataBounds),
        }
    }
}

/// Invoke the callback, logging and swallowing any panic.
fn notify(callback: ResultCallback<'_>, result: &BatchJobResult) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
        warn!(
            axes = %format!("{}/{}", result.axes.0, result.axes.1),
            "batch callback panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

//! Engine facade wiring every component from one [`EngineConfig`].
//!
//! # Example
//!
//! ```
//! use cohort_density_core::{AxisSpec, Cohort, Engine, EngineConfig, GridSpec};
//!
//! let engine = Engine::new(EngineConfig::default()).expect("default config is valid");
//! let cohort = Cohort::new("A", vec![vec![0.0, 1.0], vec![1.0, 0.5], vec![0.5, 0.2]])
//!     .expect("equal-length rows");
//! let out = engine.density(
//!     &cohort,
//!     &AxisSpec::component(0),
//!     &AxisSpec::component(1),
//!     &GridSpec::new(8, 8),
//! );
//! assert!((out.density.total_mass() - 1.0).abs() < 1e-6);
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::batch::{BatchEngine, BatchSummary, ResultCallback};
use crate::cache::{CachedDensity, DatasetKey, DensityCache};
use crate::compare::{AbComparison, AbComparisonEngine};
use crate::config::EngineConfig;
use crate::density::DensityEngine;
use crate::distance::MetricRegistry;
use crate::divergence::{DivergenceComputer, DivergenceMatrix, DivergenceMetric};
use crate::error::EngineResult;
use crate::grid::PolicyRegistry;
use crate::provenance::{Alignment, DataSummary, Operation, Provenance, SurfaceKind};
use crate::recipe::{PairSelection, Recipe};
use crate::scoring::{DependenceMetric, PairScorer, ScorerConfig};
use crate::similarity::{SimilarityComputer, SimilarityMatrix};
use crate::types::{AxisSpec, Cohort, GridSpec};

/// All engine components, built once and shared.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    metrics: Arc<MetricRegistry>,
    policies: Arc<PolicyRegistry>,
    density: DensityEngine,
    cache: Option<Arc<DensityCache>>,
    scorer: PairScorer,
    ab: AbComparisonEngine,
    divergence: DivergenceComputer,
    similarity: SimilarityComputer,
    batch: BatchEngine,
}

impl Engine {
    /// Build with the built-in distance metrics and default grid policies.
    ///
    /// # Errors
    /// `EngineError::ConfigError` if `config` fails validation.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let policies = PolicyRegistry::with_defaults(&config.grid)?;
        Self::with_registries(config, MetricRegistry::with_builtins(), policies)
    }

    /// Build with caller-supplied metric and policy registries.
    ///
    /// # Errors
    /// `EngineError::ConfigError` if `config` fails validation.
    pub fn with_registries(
        config: EngineConfig,
        metrics: MetricRegistry,
        policies: PolicyRegistry,
    ) -> EngineResult<Self> {
        config.validate()?;
        let metrics = Arc::new(metrics);
        let policies = Arc::new(policies);
        let density = DensityEngine::new(Arc::clone(&metrics), config.grid.epsilon);

        let cache = if config.cache.enabled {
            Some(Arc::new(DensityCache::new(config.cache.clone(), density.clone())?))
        } else {
            None
        };

        let scorer = PairScorer::new(
            ScorerConfig {
                limits: config.scoring.clone(),
                ..ScorerConfig::default()
            },
            Arc::clone(&metrics),
        );
        let ab = AbComparisonEngine::new(density.clone(), Arc::clone(&policies))
            .with_fingerprint_sampling(
                config.cache.fingerprint_max_rows,
                config.cache.fingerprint_max_cols,
            );
        let divergence = DivergenceComputer::new(ab.clone(), config.batch.clone());
        let similarity = SimilarityComputer::new(scorer.clone(), config.batch.clone());
        let batch = BatchEngine::new(
            density.clone(),
            Arc::clone(&policies),
            scorer.clone(),
            cache.clone(),
            config.batch.clone(),
        );

        info!(
            cache = config.cache.enabled,
            threads = config.batch.effective_threads(),
            metrics = metrics.names().len(),
            policies = ?policies.ids(),
            "cohort density engine ready"
        );

        Ok(Self {
            config,
            metrics,
            policies,
            density,
            cache,
            scorer,
            ab,
            divergence,
            similarity,
            batch,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricRegistry> {
        &self.metrics
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    pub fn density_engine(&self) -> &DensityEngine {
        &self.density
    }

    /// The shared cache; `None` when caching is disabled.
    pub fn cache(&self) -> Option<&Arc<DensityCache>> {
        self.cache.as_ref()
    }

    pub fn scorer(&self) -> &PairScorer {
        &self.scorer
    }

    pub fn comparison(&self) -> &AbComparisonEngine {
        &self.ab
    }

    pub fn divergence_computer(&self) -> &DivergenceComputer {
        &self.divergence
    }

    pub fn similarity_computer(&self) -> &SimilarityComputer {
        &self.similarity
    }

    pub fn batch_engine(&self) -> &BatchEngine {
        &self.batch
    }

    /// Density for one axis pair, through the cache when enabled. The
    /// returned provenance records `ExplicitBounds` when `grid` pins every
    /// bound.
    pub fn density(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
    ) -> CachedDensity {
        let dataset_key = match &self.cache {
            Some(cache) => cache.dataset_key(cohort),
            None => DatasetKey::for_cohort(
                cohort,
                self.config.cache.fingerprint_max_rows,
                self.config.cache.fingerprint_max_cols,
            ),
        };
        let request = || {
            Provenance::builder(Operation::Baseline, SurfaceKind::PdfAndCdf)
                .axes(x_axis, y_axis)
                .grid(grid)
                .alignment(Alignment::for_grid(grid))
                .data_summary(DataSummary {
                    dataset_key: dataset_key.to_string(),
                    n_samples: cohort.len(),
                    dimension: cohort.dimension(),
                })
                .cohort_label(cohort.label())
        };

        match &self.cache {
            Some(cache) => cache.get_or_compute_for_request(cohort, x_axis, y_axis, grid, &request),
            None => {
                let started = Instant::now();
                let computation = self.density.compute_with_checks(cohort, x_axis, y_axis, grid);
                let provenance = request()
                    .numeric_checks(computation.checks)
                    .compute_millis(started.elapsed().as_millis() as u64)
                    .build();
                CachedDensity {
                    density: Arc::new(computation.result),
                    from_cache: false,
                    provenance: Some(provenance),
                }
            }
        }
    }

    /// A/B comparison using the shared cache.
    ///
    /// # Errors
    /// See [`AbComparisonEngine::compare`].
    pub fn compare(
        &self,
        a: &Cohort,
        b: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        recipe: &Recipe,
    ) -> EngineResult<AbComparison> {
        self.ab.compare(a, b, x_axis, y_axis, recipe, self.cache.as_deref())
    }

    /// Divergence matrix using the shared cache.
    ///
    /// # Errors
    /// See [`DivergenceComputer::compute_for_components`].
    pub fn divergence(
        &self,
        a: &Cohort,
        b: &Cohort,
        indices: &[usize],
        recipe: &Recipe,
        metric: DivergenceMetric,
    ) -> EngineResult<DivergenceMatrix> {
        self.divergence
            .compute_for_components(a, b, indices, recipe, metric, self.cache.as_deref())
    }

    /// Similarity matrix over components `[start, end]`, guarded by the
    /// recipe's bins and minimum average count per cell.
    ///
    /// # Errors
    /// See [`SimilarityComputer::compute`].
    pub fn similarity(
        &self,
        cohort: &Cohort,
        start: usize,
        end: usize,
        metric: DependenceMetric,
        recipe: &Recipe,
    ) -> EngineResult<SimilarityMatrix> {
        let config = recipe.scorer_config(&self.config.scoring);
        self.similarity.compute(cohort, start, end, metric, &config)
    }

    /// Batch run in the mode the recipe's pair selection implies.
    ///
    /// # Errors
    /// See [`BatchEngine::run_component_pairs`].
    pub fn run_batch(
        &self,
        cohort: &Cohort,
        recipe: &Recipe,
        callback: Option<ResultCallback<'_>>,
    ) -> EngineResult<BatchSummary> {
        match recipe.pair_selection() {
            PairSelection::Whitelist => self.batch.run_whitelist(cohort, recipe, callback),
            _ => self.batch.run_component_pairs(cohort, recipe, callback),
        }
    }
}

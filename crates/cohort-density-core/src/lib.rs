//! Joint-density, alignment and divergence engine for feature-vector cohorts.
//!
//! A cohort is a named set of equal-length numeric vectors. The engine projects
//! each vector onto two scalar axes, bins the pairs into 2D PDF/CDF surfaces,
//! aligns surfaces from different cohorts on one canonical grid, and measures
//! how far apart they are.
//!
//! # Architecture
//!
//! - **scalar**: `AxisSpec` projection of vectors to scalars
//! - **grid**: canonical range policies and their registry
//! - **density**: 2D histogram PDF/CDF estimation
//! - **cache**: fingerprint-keyed LRU + TTL density cache
//! - **scoring**: dependence measures and the sufficiency guard
//! - **compare** / **divergence** / **similarity**: cohort comparisons
//! - **batch**: recipe-driven parallel surface generation
//! - **engine**: one facade wiring everything from `EngineConfig`
//!
//! # Example
//!
//! ```
//! use cohort_density_core::{Cohort, DivergenceMetric, Engine, EngineConfig, Recipe};
//!
//! let engine = Engine::new(EngineConfig::default()).expect("valid config");
//! let a = Cohort::new("A", (0..50).map(|i| vec![i as f64, (i % 7) as f64]).collect())
//!     .expect("valid rows");
//! let recipe = Recipe::builder("self-check").bins(8, 8).build().expect("valid recipe");
//!
//! let m = engine
//!     .divergence(&a, &a, &[0, 1], &recipe, DivergenceMetric::JensenShannon)
//!     .expect("divergence");
//! assert!(m.values.iter().flatten().all(|v| v.abs() < 1e-12));
//! ```

pub mod batch;
pub mod cache;
pub mod compare;
pub mod config;
pub mod density;
pub mod distance;
pub mod divergence;
pub mod engine;
pub mod error;
pub mod grid;
pub mod parallel;
pub mod provenance;
pub mod recipe;
pub mod scalar;
pub mod scoring;
pub mod similarity;
pub mod types;

pub use batch::{BatchEngine, BatchJobResult, BatchSummary, ResultCallback};
pub use cache::{CacheStats, CachedDensity, DatasetKey, DensityCache};
pub use compare::{AbComparison, AbComparisonEngine};
pub use config::{BatchConfig, CacheConfig, EngineConfig, GridConfig, ScoringConfig};
pub use density::DensityEngine;
pub use distance::{DistanceMetric, MetricRegistry};
pub use divergence::{DivergenceComputer, DivergenceMatrix, DivergenceMetric};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use grid::{AxisOverride, CanonicalGridPolicy, GridMode, PolicyRegistry};
pub use provenance::{Alignment, Operation, Provenance, SurfaceKind};
pub use recipe::{BoundsPolicy, OutputKind, PairSelection, Recipe, RecipeBuilder};
pub use scoring::{DependenceMetric, PairScore, PairScorer, ScorerConfig};
pub use similarity::{SimilarityComputer, SimilarityMatrix};
pub use types::{AxisSpec, Cohort, DensityResult, FeatureVector, Grid2, GridSpec};

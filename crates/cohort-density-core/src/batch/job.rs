//! Batch job descriptions, per-job results and the run summary.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::CacheStats;
use crate::provenance::Provenance;
use crate::types::{AxisSpec, DensityResult, GridSpec};

/// One surface to compute.
#[derive(Clone)]
pub(crate) struct BatchJob {
    /// Position in submission order; breaks score ties.
    pub submission: usize,
    pub components: Option<(usize, usize)>,
    pub x_axis: AxisSpec,
    pub y_axis: AxisSpec,
    pub rank: Option<usize>,
    pub score: Option<f64>,
}

// Task names stay short even for axes carrying reference vectors.
impl fmt::Debug for BatchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}/{}", self.submission, self.x_axis, self.y_axis)
    }
}

/// Output of one batch job.
#[derive(Debug, Clone, Serialize)]
pub struct BatchJobResult {
    /// `(i, j)` for component-pair jobs; `None` for whitelisted axis pairs.
    pub component_indices: Option<(usize, usize)>,
    pub axes: (AxisSpec, AxisSpec),
    pub grid: GridSpec,
    pub density: Arc<DensityResult>,
    /// 1-based position in the scorer's ranking.
    pub rank: Option<usize>,
    pub score: Option<f64>,
    pub from_cache: bool,
    pub compute_millis: u64,
    pub provenance: Provenance,
    #[serde(skip)]
    pub(crate) submission: usize,
}

impl BatchJobResult {
    /// Score used for ordering; unscored jobs count as 0.
    pub fn sort_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub dataset_key: String,
    pub recipe_name: String,
    /// Canonical policy used, for `CanonicalByFeature` recipes.
    pub policy_id: Option<String>,
    /// Sorted by descending score, then submission order.
    pub results: Vec<BatchJobResult>,
    pub wall_millis: u64,
    pub submitted: usize,
    /// Jobs whose density was computed rather than served from the cache.
    pub computed: usize,
    pub cache_hits: usize,
    /// Cache counters at the end of the run, when a cache is attached.
    pub cache_stats: Option<CacheStats>,
}

impl BatchSummary {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `(i, j)` of every component-pair result, in result order.
    pub fn component_pairs(&self) -> Vec<(usize, usize)> {
        self.results
            .iter()
            .filter_map(|r| r.component_indices)
            .collect()
    }
}

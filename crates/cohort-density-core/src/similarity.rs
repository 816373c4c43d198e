//! Component-by-component dependence matrices for a single cohort.

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::config::BatchConfig;
use crate::error::EngineResult;
use crate::parallel::{build_pool, run_fail_fast};
use crate::provenance::{Alignment, DataSummary, Operation, Provenance, SurfaceKind};
use crate::scoring::{clamp_range, DependenceMetric, PairScorer, ScorerConfig};
use crate::types::{Cohort, Grid2};

/// Symmetric dependence matrix over a contiguous component range.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatrix {
    /// `matrix[i][j] == matrix[j][i]`. The diagonal is `1.0`, or `NaN` when
    /// the cohort is too small for the configured grid.
    pub matrix: Grid2,
    pub sufficiency_mask: Vec<Vec<bool>>,
    pub labels: Vec<String>,
    /// Component indices covered, after clamping.
    pub indices: Vec<usize>,
    /// Shared sufficiency flag; every pair draws on the same rows.
    pub sufficient: bool,
    pub metric: DependenceMetric,
    pub provenance: Provenance,
}

impl SimilarityMatrix {
    pub fn size(&self) -> usize {
        self.indices.len()
    }
}

/// Builds similarity matrices on the worker pool.
#[derive(Debug, Clone)]
pub struct SimilarityComputer {
    scorer: PairScorer,
    batch: BatchConfig,
}

impl SimilarityComputer {
    /// `scorer` supplies the default scoring limits; the grid, guard and
    /// metric are chosen per call.
    pub fn new(scorer: PairScorer, batch: BatchConfig) -> Self {
        Self { scorer, batch }
    }

    pub fn scorer(&self) -> &PairScorer {
        &self.scorer
    }

    /// Similarity over components `[start, end]`, clamped to the cohort's
    /// dimensionality. An empty range yields an empty matrix.
    ///
    /// `config` supplies the sufficiency grid and threshold; `metric`
    /// overrides its dependence metric.
    ///
    /// # Errors
    /// `EngineError::ThreadPool` if the pool cannot be built, or
    /// `EngineError::Aborted` if a row task fails.
    pub fn compute(
        &self,
        cohort: &Cohort,
        start: usize,
        end: usize,
        metric: DependenceMetric,
        config: &ScorerConfig,
    ) -> EngineResult<SimilarityMatrix> {
        let started = Instant::now();
        let scorer = self.scorer.with_config(ScorerConfig {
            metric,
            ..config.clone()
        });

        let indices: Vec<usize> = clamp_range(start, end, cohort.dimension())
            .map(|(s, e)| (s..=e).collect())
            .unwrap_or_default();
        let f = indices.len();
        let guard = scorer.sufficiency(cohort.len());
        let columns: Vec<Vec<f64>> = indices.iter().map(|&c| cohort.column(c)).collect();

        let pool = build_pool(&self.batch)?;
        let rows = run_fail_fast(&pool, "similarity", (0..f).collect(), |row: usize| {
            Ok(((row + 1)..f)
                .map(|col| scorer.score(&columns[row], &columns[col]))
                .collect::<Vec<f64>>())
        })?;

        let diagonal = if guard.sufficient { 1.0 } else { f64::NAN };
        let mut matrix = vec![vec![0.0; f]; f];
        for (row, scores) in rows.into_iter().enumerate() {
            matrix[row][row] = diagonal;
            for (offset, score) in scores.into_iter().enumerate() {
                let col = row + 1 + offset;
                matrix[row][col] = score;
                matrix[col][row] = score;
            }
        }

        if let Some(reason) = &guard.reason {
            debug!(cohort = cohort.label(), "similarity marked insufficient: {}", reason);
        }

        let provenance = Provenance::builder(Operation::Similarity, SurfaceKind::SimilarityMatrix)
            .axes(format!("components{:?}", (start, end)), metric)
            .alignment(Alignment::DataBounds)
            .data_summary(DataSummary {
                dataset_key: cohort.dataset_id().unwrap_or(cohort.label()).to_string(),
                n_samples: cohort.len(),
                dimension: cohort.dimension(),
            })
            .cohort_label(cohort.label())
            .compute_millis(started.elapsed().as_millis() as u64)
            .build();

        Ok(SimilarityMatrix {
            matrix,
            sufficiency_mask: vec![vec![guard.sufficient; f]; f],
            labels: indices.iter().map(|&c| cohort.component_label(c)).collect(),
            indices,
            sufficient: guard.sufficient,
            metric,
            provenance,
        })
    }
}

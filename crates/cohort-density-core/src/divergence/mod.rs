//! Pairwise divergence matrices between two cohorts.
//!
//! For a list of component indices `[c_0, .., c_{F-1}]` the matrix holds, for
//! every unordered pair `(c_i, c_j)` including the diagonal, the divergence
//! between cohort A's and cohort B's joint densities over `(c_i, c_j)` on a
//! shared grid. Rows of the upper triangle run as separate pool tasks; the
//! lower triangle is mirrored.

mod measures;

pub use measures::{hellinger, jensen_shannon, normalize_mass, total_variation, DivergenceMetric};

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::cache::DensityCache;
use crate::compare::AbComparisonEngine;
use crate::config::BatchConfig;
use crate::error::EngineResult;
use crate::parallel::{build_pool, run_fail_fast};
use crate::provenance::{Alignment, Operation, Provenance, SurfaceKind};
use crate::recipe::{BoundsPolicy, Recipe};
use crate::types::{AxisSpec, Cohort, Grid2};

/// Symmetric `F x F` divergence matrix with per-cell data quality.
#[derive(Debug, Clone, Serialize)]
pub struct DivergenceMatrix {
    /// `values[i][j] == values[j][i]`, each in `[0, 1]`.
    pub values: Grid2,
    /// Smaller of the two cohorts' average samples per grid cell.
    pub quality: Grid2,
    pub labels: Vec<String>,
    pub indices: Vec<usize>,
    pub metric: DivergenceMetric,
    pub provenance: Provenance,
}

impl DivergenceMatrix {
    pub fn size(&self) -> usize {
        self.indices.len()
    }

    /// Largest off-diagonal value with its `(i, j)` position.
    pub fn max_off_diagonal(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (i, row) in self.values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate().skip(i + 1) {
                if best.map_or(true, |(_, _, b)| v > b) {
                    best = Some((i, j, v));
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    value: f64,
    quality: f64,
}

/// Computes divergence matrices on the worker pool.
#[derive(Debug, Clone)]
pub struct DivergenceComputer {
    ab: AbComparisonEngine,
    batch: BatchConfig,
}

impl DivergenceComputer {
    pub fn new(ab: AbComparisonEngine, batch: BatchConfig) -> Self {
        Self { ab, batch }
    }

    pub fn comparison_engine(&self) -> &AbComparisonEngine {
        &self.ab
    }

    /// Divergence between `a` and `b` for every unordered pair of `indices`.
    ///
    /// Each pair is aligned through the A/B engine under the recipe's bounds
    /// policy, and densities go through `cache` when the recipe allows it.
    ///
    /// # Errors
    /// `EngineError::Aborted` wrapping the first failing pair (for example a
    /// dimension mismatch); no partial matrix is returned.
    pub fn compute_for_components(
        &self,
        a: &Cohort,
        b: &Cohort,
        indices: &[usize],
        recipe: &Recipe,
        metric: DivergenceMetric,
        cache: Option<&DensityCache>,
    ) -> EngineResult<DivergenceMatrix> {
        let start = Instant::now();
        let f = indices.len();
        let pool = build_pool(&self.batch)?;

        let rows = run_fail_fast(&pool, "divergence", (0..f).collect(), |row: usize| {
            (row..f)
                .map(|col| self.cell(a, b, indices[row], indices[col], recipe, metric, cache))
                .collect::<EngineResult<Vec<Cell>>>()
        })?;

        let mut values = vec![vec![0.0; f]; f];
        let mut quality = vec![vec![0.0; f]; f];
        for (row, cells) in rows.into_iter().enumerate() {
            for (offset, cell) in cells.into_iter().enumerate() {
                let col = row + offset;
                values[row][col] = cell.value;
                values[col][row] = cell.value;
                quality[row][col] = cell.quality;
                quality[col][row] = cell.quality;
            }
        }

        let labels = indices.iter().map(|&c| a.component_label(c)).collect();
        let (bins_x, bins_y) = recipe.bins();
        let components = format!("components{:?}", indices);
        let provenance = Provenance::builder(Operation::Divergence, SurfaceKind::DivergenceMatrix)
            .axes(&components, &components)
            .grid(format!("{}x{}|per-pair", bins_x, bins_y))
            .alignment(self.alignment_for(recipe))
            .recipe_name(Some(recipe.name()))
            .cohort_label(a.label())
            .cohort_label(b.label())
            .compute_millis(start.elapsed().as_millis() as u64)
            .build();

        debug!(
            a = a.label(),
            b = b.label(),
            metric = %metric,
            size = f,
            elapsed_ms = provenance.compute_millis,
            "divergence matrix computed"
        );

        Ok(DivergenceMatrix {
            values,
            quality,
            labels,
            indices: indices.to_vec(),
            metric,
            provenance,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn cell(
        &self,
        a: &Cohort,
        b: &Cohort,
        i: usize,
        j: usize,
        recipe: &Recipe,
        metric: DivergenceMetric,
        cache: Option<&DensityCache>,
    ) -> EngineResult<Cell> {
        let x = AxisSpec::component(i);
        let y = AxisSpec::component(j);
        let cmp = self.ab.compare(a, b, &x, &y, recipe, cache)?;

        let p = normalize_mass(&cmp.density_a.probability_mass());
        let q = normalize_mass(&cmp.density_b.probability_mass());
        let cells = cmp.grid.cell_count().max(1) as f64;
        let quality = cmp.density_a.n_samples.min(cmp.density_b.n_samples) as f64 / cells;

        Ok(Cell {
            value: metric.between(&p, &q),
            quality,
        })
    }

    fn alignment_for(&self, recipe: &Recipe) -> Alignment {
        match recipe.bounds_policy() {
            BoundsPolicy::Fixed01 => Alignment::Fixed01,
            BoundsPolicy::DataMinMax => Alignment::UnionOfRanges,
            BoundsPolicy::CanonicalByFeature => {
                let id = recipe.canonical_policy_id().unwrap_or_default();
                Alignment::CanonicalPolicy(self.ab.policies().get(id).id().to_string())
            }
        }
    }
}

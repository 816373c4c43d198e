//! Computed joint density surfaces.

use serde::Serialize;

/// Row-major 2D grid: `grid[y][x]`.
pub type Grid2 = Vec<Vec<f64>>;

/// Joint PDF and CDF over a 2D grid, with the edges and centers that define it.
///
/// For non-empty input `sum(pdf) * dx * dy ≈ 1`; `cdf` is non-decreasing
/// along +x and +y and its terminal cell lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityResult {
    /// Density per cell, `pdf[y][x]`.
    pub pdf: Grid2,
    /// Cumulative probability up to and including each cell, `cdf[y][x]`.
    pub cdf: Grid2,
    /// `bins_x + 1` edges along x.
    pub x_edges: Vec<f64>,
    /// `bins_y + 1` edges along y.
    pub y_edges: Vec<f64>,
    pub x_centers: Vec<f64>,
    pub y_centers: Vec<f64>,
    /// Bin width along x.
    pub dx: f64,
    /// Bin width along y.
    pub dy: f64,
    /// Samples that contributed to the histogram.
    pub n_samples: usize,
}

impl DensityResult {
    pub fn bins_x(&self) -> usize {
        self.x_centers.len()
    }

    pub fn bins_y(&self) -> usize {
        self.y_centers.len()
    }

    /// `sum(pdf) * dx * dy`; 1 for non-empty input, 0 for empty.
    pub fn total_mass(&self) -> f64 {
        let sum: f64 = self.pdf.iter().flatten().sum();
        sum * self.dx * self.dy
    }

    /// Value of the last CDF cell (0 for an empty grid).
    pub fn cdf_terminal(&self) -> f64 {
        self.cdf
            .last()
            .and_then(|row| row.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Flattened per-cell probability mass (`pdf * dx * dy`), row-major.
    ///
    /// Negative and non-finite cells are clamped to 0.
    pub fn probability_mass(&self) -> Vec<f64> {
        let area = self.dx * self.dy;
        self.pdf
            .iter()
            .flatten()
            .map(|&p| {
                let m = p * area;
                if m.is_finite() && m > 0.0 {
                    m
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Bounds covered by the grid: `((min_x, max_x), (min_y, max_y))`.
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let first_last = |edges: &[f64]| {
            (
                edges.first().copied().unwrap_or(0.0),
                edges.last().copied().unwrap_or(0.0),
            )
        };
        (first_last(&self.x_edges), first_last(&self.y_edges))
    }
}

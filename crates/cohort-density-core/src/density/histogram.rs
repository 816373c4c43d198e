//! Uniform 2D histogram with PDF and prefix-sum CDF.

use crate::grid::{finite_min_max, widen_degenerate};
use crate::provenance::NumericChecks;
use crate::types::{DensityResult, Grid2, GridSpec};

/// A density surface plus the self-checks gathered while building it.
#[derive(Debug, Clone)]
pub struct DensityComputation {
    pub result: DensityResult,
    pub checks: NumericChecks,
}

/// Build the joint density of `(xs[k], ys[k])` on `grid`.
///
/// Pairs with a non-finite coordinate are dropped and counted. Unset bounds
/// come from the finite data (or `(0, 1)` when there is none); spans
/// narrower than `epsilon` are widened. Out-of-range samples land in the
/// nearest edge bin.
pub fn compute_from_pairs(
    xs: &[f64],
    ys: &[f64],
    grid: &GridSpec,
    epsilon: f64,
) -> DensityComputation {
    let (fx, fy): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    let dropped = xs.len().min(ys.len()) - fx.len();

    let bins_x = grid.bins_x();
    let bins_y = grid.bins_y();
    let (min_x, max_x) = resolve_bounds(grid.x_bounds(), &fx, epsilon);
    let (min_y, max_y) = resolve_bounds(grid.y_bounds(), &fy, epsilon);
    let dx = (max_x - min_x) / bins_x as f64;
    let dy = (max_y - min_y) / bins_y as f64;

    let mut counts = vec![vec![0usize; bins_x]; bins_y];
    for (x, y) in fx.iter().zip(&fy) {
        let bx = bin_index(*x, min_x, dx, bins_x);
        let by = bin_index(*y, min_y, dy, bins_y);
        counts[by][bx] += 1;
    }

    let n = fx.len();
    let (pdf, cdf) = if n == 0 {
        (vec![vec![0.0; bins_x]; bins_y], vec![vec![0.0; bins_x]; bins_y])
    } else {
        let total = n as f64;
        let area = dx * dy;
        let pdf: Grid2 = counts
            .iter()
            .map(|row| row.iter().map(|&c| c as f64 / (total * area)).collect())
            .collect();
        (pdf, prefix_cdf(&counts, total))
    };

    let result = DensityResult {
        pdf,
        cdf,
        x_edges: edges(min_x, max_x, dx, bins_x),
        y_edges: edges(min_y, max_y, dy, bins_y),
        x_centers: centers(min_x, dx, bins_x),
        y_centers: centers(min_y, dy, bins_y),
        dx,
        dy,
        n_samples: n,
    };
    let checks = NumericChecks {
        pdf_mass: result.total_mass(),
        cdf_terminal: result.cdf_terminal(),
        dropped_non_finite: dropped,
    };
    DensityComputation { result, checks }
}

fn resolve_bounds(explicit: (Option<f64>, Option<f64>), data: &[f64], epsilon: f64) -> (f64, f64) {
    let inferred = finite_min_max(data);
    let min = explicit.0.or(inferred.map(|r| r.0)).unwrap_or(0.0);
    let max = explicit.1.or(inferred.map(|r| r.1)).unwrap_or(1.0);
    widen_degenerate(min, max, epsilon)
}

#[inline]
fn bin_index(v: f64, min: f64, width: f64, bins: usize) -> usize {
    let raw = ((v - min) / width).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(bins - 1)
    }
}

fn edges(min: f64, max: f64, width: f64, bins: usize) -> Vec<f64> {
    let mut edges: Vec<f64> = (0..=bins).map(|k| min + k as f64 * width).collect();
    edges[bins] = max;
    edges
}

fn centers(min: f64, width: f64, bins: usize) -> Vec<f64> {
    (0..bins).map(|k| min + (k as f64 + 0.5) * width).collect()
}

/// Row-then-column prefix sum of cell probabilities, clamped to `[0, 1]`.
///
/// Summing each row first and then accumulating rows keeps the result
/// monotone along both axes under floating-point rounding.
fn prefix_cdf(counts: &[Vec<usize>], total: f64) -> Grid2 {
    let bins_x = counts.first().map_or(0, Vec::len);
    let mut cdf: Grid2 = Vec::with_capacity(counts.len());
    let mut above = vec![0.0; bins_x];
    for row in counts {
        let mut running = 0.0;
        let mut out = Vec::with_capacity(bins_x);
        for (x, &c) in row.iter().enumerate() {
            running += c as f64 / total;
            let value = (above[x] + running).clamp(0.0, 1.0);
            out.push(value);
        }
        above.copy_from_slice(&out);
        cdf.push(out);
    }
    cdf
}

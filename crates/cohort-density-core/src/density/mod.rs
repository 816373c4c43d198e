//! Joint density estimation over pairs of scalar axes.
//!
//! ```text
//! cohort --extract_pairs--> (xs, ys) --compute_from_pairs--> DensityResult
//! ```

mod histogram;

pub use histogram::{compute_from_pairs, DensityComputation};

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::DEFAULT_EPSILON;
use crate::distance::MetricRegistry;
use crate::scalar::extract_pairs;
use crate::types::{AxisSpec, Cohort, DensityResult, GridSpec};

/// Computes joint PDF/CDF surfaces for a cohort.
///
/// Stateless apart from the shared metric registry, so one engine can serve
/// any number of threads.
#[derive(Debug, Clone)]
pub struct DensityEngine {
    metrics: Arc<MetricRegistry>,
    epsilon: f64,
}

impl Default for DensityEngine {
    fn default() -> Self {
        Self::new(Arc::new(MetricRegistry::with_builtins()), DEFAULT_EPSILON)
    }
}

impl DensityEngine {
    pub fn new(metrics: Arc<MetricRegistry>, epsilon: f64) -> Self {
        Self { metrics, epsilon }
    }

    pub fn metrics(&self) -> &Arc<MetricRegistry> {
        &self.metrics
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Joint density of `(x_axis, y_axis)` over `cohort` on `grid`.
    pub fn compute_joint_density(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
    ) -> DensityResult {
        self.compute_with_checks(cohort, x_axis, y_axis, grid).result
    }

    /// As [`compute_joint_density`](Self::compute_joint_density), also returning numeric checks.
    pub fn compute_with_checks(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
    ) -> DensityComputation {
        let start = Instant::now();
        let (xs, ys) = extract_pairs(cohort, x_axis, y_axis, &self.metrics);
        let out = compute_from_pairs(&xs, &ys, grid, self.epsilon);

        debug!(
            cohort = cohort.label(),
            x = %x_axis.key(),
            y = %y_axis.key(),
            grid = %grid,
            n = out.result.n_samples,
            dropped = out.checks.dropped_non_finite,
            elapsed_us = start.elapsed().as_micros() as u64,
            "computed joint density"
        );
        out
    }
}

//! Scalar extraction: one real number per feature vector per axis.
//!
//! Missing precomputed inputs resolve to `0.0` instead of failing, so that
//! large batches survive partially configured axes:
//!
//! - `DistToMean` / `CosineToMean` / `Pc1Projection` without a mean vector
//! - `MetricDistanceToMean` with an unknown metric name or no reference vector
//! - `ComponentAtDimension` with an out-of-range index
//! - `Pc1Projection` without loadings of matching length
//!
//! Column-level helpers report these degradations once per column at `debug`.

use tracing::debug;

use crate::distance::{squared_euclidean, MetricRegistry};
use crate::types::{AxisSpec, Cohort};

/// Per-cohort precomputed inputs needed by some axes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarContext<'a> {
    mean: Option<&'a [f64]>,
    pc1: Option<&'a [f64]>,
    metrics: Option<&'a MetricRegistry>,
}

impl<'a> ScalarContext<'a> {
    /// Context with nothing precomputed: every dependent axis yields 0.0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying the cohort's memoised mean and PC1 loadings.
    #[must_use]
    pub fn for_cohort(cohort: &'a Cohort, metrics: &'a MetricRegistry) -> Self {
        Self {
            mean: (!cohort.is_empty()).then(|| cohort.mean()),
            pc1: cohort.pc1_loadings(),
            metrics: Some(metrics),
        }
    }

    #[must_use]
    pub fn with_mean(mut self, mean: &'a [f64]) -> Self {
        self.mean = Some(mean);
        self
    }

    #[must_use]
    pub fn with_pc1(mut self, loadings: &'a [f64]) -> Self {
        self.pc1 = Some(loadings);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: &'a MetricRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Why `axis` will degrade to 0.0 for vectors of `dimension`, if it will.
    pub fn degradation(&self, axis: &AxisSpec, dimension: usize) -> Option<String> {
        match axis {
            AxisSpec::DistToMean | AxisSpec::CosineToMean if self.mean.is_none() => {
                Some(format!("{} requires a mean vector", axis))
            }
            AxisSpec::MetricDistanceToMean { metric, reference } => {
                if reference.is_none() {
                    Some(format!("metric axis '{}' has no reference vector", metric))
                } else if !self.metrics.is_some_and(|m| m.contains(metric)) {
                    Some(format!("metric '{}' is not registered", metric))
                } else {
                    None
                }
            }
            AxisSpec::ComponentAtDimension(i) if *i >= dimension => Some(format!(
                "component index {} out of range for dimension {}",
                i, dimension
            )),
            AxisSpec::Pc1Projection => match (self.mean, self.pc1) {
                (None, _) => Some("PC1 projection requires a mean vector".to_string()),
                (_, None) => Some("PC1 projection has no loadings".to_string()),
                (_, Some(l)) if l.len() != dimension => Some(format!(
                    "PC1 loadings length {} does not match dimension {}",
                    l.len(),
                    dimension
                )),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Reduce one feature vector to a scalar for `axis`.
pub fn extract(vector: &[f64], axis: &AxisSpec, ctx: &ScalarContext<'_>) -> f64 {
    match axis {
        AxisSpec::L1Norm => vector.iter().map(|v| v.abs()).sum(),
        AxisSpec::LInfNorm => vector.iter().fold(0.0, |acc, v| acc.max(v.abs())),
        AxisSpec::Mean => {
            if vector.is_empty() {
                0.0
            } else {
                vector.iter().sum::<f64>() / vector.len() as f64
            }
        }
        AxisSpec::Max => vector.iter().copied().reduce(f64::max).unwrap_or(0.0),
        AxisSpec::Min => vector.iter().copied().reduce(f64::min).unwrap_or(0.0),
        AxisSpec::DistToMean => ctx
            .mean
            .map_or(0.0, |mean| squared_euclidean(vector, mean).sqrt()),
        AxisSpec::CosineToMean => ctx.mean.map_or(0.0, |mean| cosine_similarity(vector, mean)),
        AxisSpec::MetricDistanceToMean { metric, reference } => {
            match (ctx.metrics.and_then(|m| m.get(metric)), reference) {
                (Some(m), Some(r)) => m.distance(vector, r),
                _ => 0.0,
            }
        }
        AxisSpec::ComponentAtDimension(i) => vector.get(*i).copied().unwrap_or(0.0),
        AxisSpec::Pc1Projection => match (ctx.mean, ctx.pc1) {
            (Some(mean), Some(loadings)) if loadings.len() == vector.len() => vector
                .iter()
                .zip(mean)
                .zip(loadings)
                .map(|((v, m), l)| (v - m) * l)
                .sum(),
            _ => 0.0,
        },
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Extract one scalar per row of `cohort` for `axis`.
pub fn extract_column(cohort: &Cohort, axis: &AxisSpec, metrics: &MetricRegistry) -> Vec<f64> {
    let ctx = ScalarContext::for_cohort(cohort, metrics);
    report_degradation(cohort, axis, &ctx);
    cohort
        .vectors()
        .iter()
        .map(|v| extract(v, axis, &ctx))
        .collect()
}

/// Extract `(x_i, y_i)` for every row of `cohort`.
pub fn extract_pairs(
    cohort: &Cohort,
    x_axis: &AxisSpec,
    y_axis: &AxisSpec,
    metrics: &MetricRegistry,
) -> (Vec<f64>, Vec<f64>) {
    let ctx = ScalarContext::for_cohort(cohort, metrics);
    report_degradation(cohort, x_axis, &ctx);
    report_degradation(cohort, y_axis, &ctx);
    cohort
        .vectors()
        .iter()
        .map(|v| (extract(v, x_axis, &ctx), extract(v, y_axis, &ctx)))
        .unzip()
}

fn report_degradation(cohort: &Cohort, axis: &AxisSpec, ctx: &ScalarContext<'_>) {
    if cohort.is_empty() {
        return;
    }
    if let Some(reason) = ctx.degradation(axis, cohort.dimension()) {
        debug!(
            cohort = cohort.label(),
            axis = %axis.key(),
            "axis resolves to 0.0: {}",
            reason
        );
    }
}

//! Ranks candidate variable pairs by statistical dependence.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dependence::{
    distance_correlation, kendall_tau_b_abs, normalized_mutual_information, pearson_abs,
};
use crate::config::ScoringConfig;
use crate::distance::MetricRegistry;
use crate::scalar::extract_pairs;
use crate::types::{AxisSpec, Cohort};

/// Dependence measure used to score a pair of columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependenceMetric {
    /// Absolute Pearson correlation.
    #[default]
    Pearson,
    /// Absolute Kendall tau-b (stride-sampled above a cap).
    Kendall,
    /// Normalized mutual information.
    Nmi,
    /// Biased distance correlation.
    DistanceCorrelation,
}

impl fmt::Display for DependenceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pearson => "pearson",
            Self::Kendall => "kendall",
            Self::Nmi => "nmi",
            Self::DistanceCorrelation => "dcor",
        };
        f.write_str(name)
    }
}

impl DependenceMetric {
    /// Score `(x, y)` with this metric under `limits`.
    pub fn score(&self, x: &[f64], y: &[f64], limits: &ScoringConfig) -> f64 {
        match self {
            Self::Pearson => pearson_abs(x, y),
            Self::Kendall => kendall_tau_b_abs(x, y, limits.kendall_max_samples),
            Self::Nmi => normalized_mutual_information(x, y, limits.mi_bins),
            Self::DistanceCorrelation => distance_correlation(x, y, limits.dcor_max_samples),
        }
    }
}

/// Settings for one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    pub metric: DependenceMetric,
    /// Grid used for the sufficiency guard; `None` disables it.
    pub bins: Option<(usize, usize)>,
    /// Minimum average samples per grid cell; `<= 0` disables the guard.
    pub min_avg_count_per_cell: f64,
    /// Include `(i, i)` pairs.
    pub include_self_pairs: bool,
    /// Enumerate both `(i, j)` and `(j, i)`.
    pub ordered_pairs: bool,
    pub limits: ScoringConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            metric: DependenceMetric::Pearson,
            bins: None,
            min_avg_count_per_cell: 0.0,
            include_self_pairs: false,
            ordered_pairs: false,
            limits: ScoringConfig::default(),
        }
    }
}

/// Score of one candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    /// Component index of x; `None` for an arbitrary axis pair.
    pub i: Option<usize>,
    /// Component index of y; `None` for an arbitrary axis pair.
    pub j: Option<usize>,
    pub score: f64,
    /// Finite sample pairs the score was computed from.
    pub n_samples: usize,
    pub sufficient: bool,
    /// Why the pair is insufficient.
    pub reason: Option<String>,
}

/// Result of the sufficiency guard.
#[derive(Debug, Clone, PartialEq)]
pub struct Sufficiency {
    pub sufficient: bool,
    pub reason: Option<String>,
}

/// `n / (bins_x * bins_y) >= threshold`; always sufficient when bins are
/// unknown or the threshold is not positive.
pub fn sufficiency(n: usize, bins: Option<(usize, usize)>, threshold: f64) -> Sufficiency {
    let Some((bx, by)) = bins else {
        return Sufficiency {
            sufficient: true,
            reason: None,
        };
    };
    let cells = bx * by;
    if threshold <= 0.0 || cells == 0 {
        return Sufficiency {
            sufficient: true,
            reason: None,
        };
    }
    let avg = n as f64 / cells as f64;
    if avg >= threshold {
        Sufficiency {
            sufficient: true,
            reason: None,
        }
    } else {
        Sufficiency {
            sufficient: false,
            reason: Some(format!(
                "{} samples over {}x{} cells is {:.3} per cell, below the minimum {}",
                n, bx, by, avg, threshold
            )),
        }
    }
}

/// Candidate `(i, j)` pairs over the inclusive range `[start, end]`.
pub fn candidate_pairs(
    start: usize,
    end: usize,
    include_self_pairs: bool,
    ordered_pairs: bool,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in start..=end {
        for j in start..=end {
            let keep = match i.cmp(&j) {
                Ordering::Less => true,
                Ordering::Equal => include_self_pairs,
                Ordering::Greater => ordered_pairs,
            };
            if keep {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Clamp `[start, end]` to a cohort of `dimension` components.
pub(crate) fn clamp_range(start: usize, end: usize, dimension: usize) -> Option<(usize, usize)> {
    if dimension == 0 {
        return None;
    }
    let end = end.min(dimension - 1);
    (start <= end).then_some((start, end))
}

/// Keep only pairs where both values are finite.
fn finite_pairs(xs: &[f64], ys: &[f64]) -> (Vec<f64>, Vec<f64>) {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip()
}

/// Scores component pairs or arbitrary axis pairs of a cohort.
#[derive(Debug, Clone)]
pub struct PairScorer {
    config: ScorerConfig,
    metrics: Arc<MetricRegistry>,
}

impl PairScorer {
    pub fn new(config: ScorerConfig, metrics: Arc<MetricRegistry>) -> Self {
        Self { config, metrics }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Same scorer with a different configuration.
    #[must_use]
    pub fn with_config(&self, config: ScorerConfig) -> Self {
        Self {
            config,
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Score two raw columns with the configured metric.
    pub fn score(&self, x: &[f64], y: &[f64]) -> f64 {
        let (x, y) = finite_pairs(x, y);
        self.config.metric.score(&x, &y, &self.config.limits)
    }

    pub fn sufficiency(&self, n: usize) -> Sufficiency {
        sufficiency(n, self.config.bins, self.config.min_avg_count_per_cell)
    }

    fn pair_score(&self, i: Option<usize>, j: Option<usize>, xs: &[f64], ys: &[f64]) -> PairScore {
        let (xs, ys) = finite_pairs(xs, ys);
        let n = xs.len();
        let guard = self.sufficiency(n);
        PairScore {
            i,
            j,
            score: self.config.metric.score(&xs, &ys, &self.config.limits),
            n_samples: n,
            sufficient: guard.sufficient,
            reason: guard.reason,
        }
    }

    /// Score every candidate component pair in `[start, end]` (clamped to the
    /// cohort's dimensionality), sorted by descending score with `(i, j)`
    /// ascending as tie-break.
    pub fn score_components(&self, cohort: &Cohort, start: usize, end: usize) -> Vec<PairScore> {
        let Some((start, end)) = clamp_range(start, end, cohort.dimension()) else {
            return Vec::new();
        };
        let columns: Vec<Vec<f64>> = (start..=end).map(|c| cohort.column(c)).collect();
        let pairs = candidate_pairs(
            start,
            end,
            self.config.include_self_pairs,
            self.config.ordered_pairs,
        );

        let mut scores: Vec<PairScore> = pairs
            .into_iter()
            .map(|(i, j)| {
                self.pair_score(Some(i), Some(j), &columns[i - start], &columns[j - start])
            })
            .collect();
        sort_scores(&mut scores);

        debug!(
            cohort = cohort.label(),
            metric = %self.config.metric,
            range = ?(start, end),
            pairs = scores.len(),
            "scored component pairs"
        );
        scores
    }

    /// Score an arbitrary axis pair. `i`/`j` are `None`.
    pub fn score_axes(&self, cohort: &Cohort, x_axis: &AxisSpec, y_axis: &AxisSpec) -> PairScore {
        let (xs, ys) = extract_pairs(cohort, x_axis, y_axis, &self.metrics);
        self.pair_score(None, None, &xs, &ys)
    }
}

/// Descending score, then ascending `(i, j)`.
pub(crate) fn sort_scores(scores: &mut [PairScore]) {
    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| (a.i, a.j).cmp(&(b.i, b.j)))
    });
}

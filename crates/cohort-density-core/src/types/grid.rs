//! 2D bin/bounds discretization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MIN_BINS;

/// Bin counts plus optional explicit bounds for a 2D surface.
///
/// Unset bounds are inferred from data at compute time. Bin counts are
/// clamped to at least [`MIN_BINS`]; non-finite bounds are treated as unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    bins_x: usize,
    bins_y: usize,
    min_x: Option<f64>,
    max_x: Option<f64>,
    min_y: Option<f64>,
    max_y: Option<f64>,
}

impl GridSpec {
    /// Grid with data-inferred bounds.
    #[must_use]
    pub fn new(bins_x: usize, bins_y: usize) -> Self {
        Self {
            bins_x: bins_x.max(MIN_BINS),
            bins_y: bins_y.max(MIN_BINS),
            min_x: None,
            max_x: None,
            min_y: None,
            max_y: None,
        }
    }

    /// Grid over the unit square.
    #[must_use]
    pub fn unit(bins_x: usize, bins_y: usize) -> Self {
        Self::new(bins_x, bins_y)
            .with_x_bounds(0.0, 1.0)
            .with_y_bounds(0.0, 1.0)
    }

    #[must_use]
    pub fn with_x_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_x = finite(min);
        self.max_x = finite(max);
        self
    }

    #[must_use]
    pub fn with_y_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_y = finite(min);
        self.max_y = finite(max);
        self
    }

    /// Raise both bin counts to at least `min_bins`.
    #[must_use]
    pub fn with_min_bins(mut self, min_bins: usize) -> Self {
        self.bins_x = self.bins_x.max(min_bins);
        self.bins_y = self.bins_y.max(min_bins);
        self
    }

    pub fn bins_x(&self) -> usize {
        self.bins_x
    }

    pub fn bins_y(&self) -> usize {
        self.bins_y
    }

    pub fn cell_count(&self) -> usize {
        self.bins_x * self.bins_y
    }

    pub fn x_bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.min_x, self.max_x)
    }

    pub fn y_bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.min_y, self.max_y)
    }

    /// True when all four bounds are explicit.
    pub fn is_fully_bounded(&self) -> bool {
        self.min_x.is_some() && self.max_x.is_some() && self.min_y.is_some() && self.max_y.is_some()
    }

    /// Deterministic encoding used in cache keys: `64x32|x[auto,auto]|y[-5,8]`.
    pub fn encode(&self) -> String {
        format!(
            "{}x{}|x[{},{}]|y[{},{}]",
            self.bins_x,
            self.bins_y,
            bound(self.min_x),
            bound(self.max_x),
            bound(self.min_y),
            bound(self.max_y)
        )
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn bound(v: Option<f64>) -> String {
    v.map_or_else(|| "auto".to_string(), |b| b.to_string())
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

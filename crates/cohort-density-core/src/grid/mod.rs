//! Axis-range policies and the registry that names them.
//!
//! A [`CanonicalGridPolicy`] decides the `(min, max)` of an axis for a given
//! cohort: a fixed unit interval, exact data min/max, or robust percentile
//! trimming. Explicit per-axis overrides win over computed ranges.

mod percentile;
mod policy;
mod registry;

pub use percentile::percentile;
pub use policy::{AxisOverride, CanonicalGridPolicy, CanonicalGridPolicyBuilder, GridMode};
pub use registry::{
    PolicyRegistry, DEFAULT_POLICY_ID, FIXED01_POLICY_ID, MINMAX_POLICY_ID, ROBUST_POLICY_ID,
};

/// Widen a span narrower than `epsilon` by moving `max` up by `epsilon`.
#[inline]
pub fn widen_degenerate(min: f64, max: f64, epsilon: f64) -> (f64, f64) {
    if max - min < epsilon {
        (min, min + epsilon)
    } else {
        (min, max)
    }
}

/// Exact min/max over the finite values of `values`; `None` if there are none.
pub fn finite_min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Elementwise union of two ranges.
#[inline]
pub fn union_range(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0.min(b.0), a.1.max(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_degenerate() {
        assert_eq!(widen_degenerate(2.0, 2.0, 0.5), (2.0, 2.5));
        assert_eq!(widen_degenerate(0.0, 1.0, 0.5), (0.0, 1.0));
        // inverted bounds collapse to a valid epsilon span
        assert_eq!(widen_degenerate(3.0, 1.0, 0.5), (3.0, 3.5));
    }

    #[test]
    fn test_finite_min_max() {
        assert_eq!(finite_min_max(&[]), None);
        assert_eq!(finite_min_max(&[f64::NAN]), None);
        assert_eq!(finite_min_max(&[3.0, f64::INFINITY, -1.0, 2.0]), Some((-1.0, 3.0)));
    }

    #[test]
    fn test_union_range() {
        assert_eq!(union_range((0.0, 2.0), (-1.0, 1.0)), (-1.0, 2.0));
    }
}

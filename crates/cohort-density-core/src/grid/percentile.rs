//! Linear-interpolation percentile estimator.

/// Percentile `p` (0..=100) of an ascending-sorted slice.
///
/// Uses `rank = p/100 * (n-1)` and interpolates linearly between the two
/// neighbouring order statistics. Returns `None` for an empty slice.
///
/// # Example
/// ```
/// use cohort_density_core::grid::percentile;
///
/// let sorted = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(percentile(&sorted, 50.0), Some(2.5));
/// assert_eq!(percentile(&sorted, 0.0), Some(1.0));
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

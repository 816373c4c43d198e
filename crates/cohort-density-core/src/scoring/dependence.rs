//! Bounded dependence measures between two scalar columns.
//!
//! Every function returns a value in `[0, 1]`, `0` on degenerate input, and
//! never NaN. Callers pass finite, equal-length slices; extra trailing
//! values of the longer slice are ignored.

/// Evenly spaced sample indices `round(k * (n-1) / (cap-1))`, or `0..n` when
/// `n <= cap`.
pub fn stride_sample(n: usize, cap: usize) -> Vec<usize> {
    if n <= cap || cap < 2 {
        return (0..n).collect();
    }
    let step = (n - 1) as f64 / (cap - 1) as f64;
    (0..cap).map(|k| (k as f64 * step).round() as usize).collect()
}

#[inline]
fn bounded(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Absolute Pearson product-moment correlation. `n < 3` or zero variance gives 0.
pub fn pearson_abs(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 3 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    bounded((sxy / denom).abs())
}

/// Absolute Kendall tau-b on at most `cap` stride-sampled points.
pub fn kendall_tau_b_abs(x: &[f64], y: &[f64], cap: usize) -> f64 {
    let n = x.len().min(y.len());
    let idx = stride_sample(n, cap);
    let m = idx.len();
    if m < 2 {
        return 0.0;
    }

    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut tied_x, mut tied_y) = (0i64, 0i64);
    for a in 0..m {
        let (xa, ya) = (x[idx[a]], y[idx[a]]);
        for &ib in &idx[a + 1..] {
            let sx = sign(x[ib] - xa);
            let sy = sign(y[ib] - ya);
            if sx == 0 {
                tied_x += 1;
            }
            if sy == 0 {
                tied_y += 1;
            }
            if sx != 0 && sy != 0 {
                if sx == sy {
                    concordant += 1;
                } else {
                    discordant += 1;
                }
            }
        }
    }

    let n0 = (m * (m - 1) / 2) as f64;
    let denom = ((n0 - tied_x as f64) * (n0 - tied_y as f64)).sqrt();
    if denom <= 0.0 {
        return 0.0;
    }
    bounded(((concordant - discordant) as f64 / denom).abs())
}

#[inline]
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Normalized mutual information `MI / sqrt(H(X) H(Y))` over `bins` equal-width
/// bins per variable, with add-one smoothing on joint and marginal counts.
/// A constant column gives 0.
pub fn normalized_mutual_information(x: &[f64], y: &[f64], bins: usize) -> f64 {
    let n = x.len().min(y.len());
    let bins = bins.max(2);
    if n < 2 {
        return 0.0;
    }
    let (Some(bx), Some(by)) = (bin_all(&x[..n], bins), bin_all(&y[..n], bins)) else {
        return 0.0;
    };

    let mut joint = vec![0usize; bins * bins];
    let mut marg_x = vec![0usize; bins];
    let mut marg_y = vec![0usize; bins];
    for (&i, &j) in bx.iter().zip(&by) {
        joint[i * bins + j] += 1;
        marg_x[i] += 1;
        marg_y[j] += 1;
    }

    let total = n as f64;
    let b = bins as f64;
    let p_marg = |c: usize| (c as f64 + 1.0) / (total + b);
    let entropy = |counts: &[usize]| -> f64 {
        counts
            .iter()
            .map(|&c| {
                let p = p_marg(c);
                -p * p.ln()
            })
            .sum()
    };

    let mut mi = 0.0;
    for i in 0..bins {
        for j in 0..bins {
            let p_xy = (joint[i * bins + j] as f64 + 1.0) / (total + b * b);
            mi += p_xy * (p_xy / (p_marg(marg_x[i]) * p_marg(marg_y[j]))).ln();
        }
    }

    let hx = entropy(&marg_x);
    let hy = entropy(&marg_y);
    let denom = (hx * hy).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    bounded(mi / denom)
}

/// Equal-width bin index per value, or `None` for a constant column.
fn bin_all(values: &[f64], bins: usize) -> Option<Vec<usize>> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        return None;
    }
    let width = span / bins as f64;
    Some(
        values
            .iter()
            .map(|&v| (((v - min) / width).floor().max(0.0) as usize).min(bins - 1))
            .collect(),
    )
}

/// Biased distance correlation on at most `cap` stride-sampled points.
///
/// Exact when `n <= cap` or `cap < 2`. Above the cap the statistic is
/// computed on an evenly strided subset, so the result approximates the
/// full-sample value rather than reproducing it.
///
/// Uses double-centered pairwise absolute differences, streamed row by row so
/// memory stays `O(n)` while time is `O(n^2)`:
/// `dCor = sqrt(dCov2(x,y) / sqrt(dVar2(x) * dVar2(y)))`.
pub fn distance_correlation(x: &[f64], y: &[f64], cap: usize) -> f64 {
    let n = x.len().min(y.len());
    let idx = stride_sample(n, cap);
    let m = idx.len();
    if m < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = idx.iter().map(|&i| x[i]).collect();
    let ys: Vec<f64> = idx.iter().map(|&i| y[i]).collect();

    let row_means = |v: &[f64]| -> (Vec<f64>, f64) {
        let means: Vec<f64> = v
            .iter()
            .map(|a| v.iter().map(|b| (a - b).abs()).sum::<f64>() / m as f64)
            .collect();
        let grand = means.iter().sum::<f64>() / m as f64;
        (means, grand)
    };
    let (ax, gx) = row_means(&xs);
    let (ay, gy) = row_means(&ys);

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..m {
        for j in 0..m {
            let a = (xs[i] - xs[j]).abs() - ax[i] - ax[j] + gx;
            let b = (ys[i] - ys[j]).abs() - ay[i] - ay[j] + gy;
            sxy += a * b;
            sxx += a * a;
            syy += b * b;
        }
    }
    let norm = (m * m) as f64;
    let dcov2 = (sxy / norm).max(0.0);
    let denom = ((sxx / norm) * (syy / norm)).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    bounded((dcov2 / denom).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_stride_sample() {
        assert_eq!(stride_sample(4, 10), vec![0, 1, 2, 3]);
        assert_eq!(stride_sample(11, 3), vec![0, 5, 10]);
        let idx = stride_sample(10_000, 100);
        assert_eq!(idx.len(), 100);
        assert_eq!(idx[0], 0);
        assert_eq!(idx[99], 9_999);
    }

    #[test]
    fn test_pearson() {
        let x = line(50);
        let neg: Vec<f64> = x.iter().map(|v| -2.0 * v + 3.0).collect();
        assert!((pearson_abs(&x, &neg) - 1.0).abs() < 1e-12);
        assert_eq!(pearson_abs(&[1.0, 2.0], &[3.0, 4.0]), 0.0);
        assert_eq!(pearson_abs(&x, &vec![5.0; 50]), 0.0);
    }

    #[test]
    fn test_kendall() {
        let x = line(30);
        let rev: Vec<f64> = x.iter().rev().copied().collect();
        assert!((kendall_tau_b_abs(&x, &rev, 1000) - 1.0).abs() < 1e-12);
        // Monotone but nonlinear still gives 1.
        let cubed: Vec<f64> = x.iter().map(|v| v.powi(3)).collect();
        assert!((kendall_tau_b_abs(&x, &cubed, 10) - 1.0).abs() < 1e-12);
        assert_eq!(kendall_tau_b_abs(&x, &vec![1.0; 30], 1000), 0.0);
    }

    #[test]
    fn test_kendall_with_ties() {
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        // C = 5, D = 0, tied_x = 1, tied_y = 0, n0 = 6 -> 5 / sqrt(5 * 6)
        let expected = 5.0 / 30.0f64.sqrt();
        assert!((kendall_tau_b_abs(&x, &y, 100) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_nmi() {
        let x: Vec<f64> = (0..2_000).map(|i| (i % 100) as f64).collect();
        let copy = x.clone();
        let unrelated: Vec<f64> = (0..2_000).map(|i| ((i * 7919) % 113) as f64).collect();
        let same = normalized_mutual_information(&x, &copy, 8);
        let indep = normalized_mutual_information(&x, &unrelated, 8);
        println!("AFTER: nmi(copy)={} nmi(unrelated)={}", same, indep);
        assert!(same > 0.85);
        assert!(indep < 0.1);
        assert_eq!(normalized_mutual_information(&x, &vec![2.0; 2_000], 8), 0.0);
        assert_eq!(normalized_mutual_information(&[1.0], &[1.0], 8), 0.0);
    }

    #[test]
    fn test_distance_correlation() {
        let x: Vec<f64> = (0..=200).map(|i| i as f64 / 20.0 - 5.0).collect();
        let linear: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        assert!((distance_correlation(&x, &linear, 4_000) - 1.0).abs() < 1e-9);

        // Nonlinear (symmetric) dependence: Pearson near 0, dCor clearly positive.
        let square: Vec<f64> = x.iter().map(|v| v * v).collect();
        assert!(pearson_abs(&x, &square) < 0.05);
        assert!(distance_correlation(&x, &square, 4_000) > 0.3);

        assert_eq!(distance_correlation(&x, &vec![0.0; 201], 4_000), 0.0);
        assert_eq!(distance_correlation(&[1.0], &[2.0], 4_000), 0.0);
    }

    #[test]
    fn test_distance_correlation_above_cap_approximates_full() {
        let x: Vec<f64> = (0..=600).map(|i| i as f64 / 60.0 - 5.0).collect();
        let square: Vec<f64> = x.iter().map(|v| v * v).collect();
        let full = distance_correlation(&x, &square, 4_000);
        let sampled = distance_correlation(&x, &square, 150);
        let uncapped = distance_correlation(&x, &square, 0);
        println!("AFTER: full={} sampled={}", full, sampled);
        assert_eq!(full, uncapped);
        assert!((full - sampled).abs() < 0.01);
    }
}

//! Divergences between two discrete probability distributions.
//!
//! All measures return values in `[0, 1]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Divergence measure for cohort comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivergenceMetric {
    /// Jensen-Shannon divergence in bits.
    JensenShannon,
    Hellinger,
    TotalVariation,
}

impl fmt::Display for DivergenceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JensenShannon => "js",
            Self::Hellinger => "hellinger",
            Self::TotalVariation => "tv",
        };
        f.write_str(name)
    }
}

impl DivergenceMetric {
    /// Divergence between two normalized distributions of equal length.
    pub fn between(&self, p: &[f64], q: &[f64]) -> f64 {
        match self {
            Self::JensenShannon => jensen_shannon(p, q),
            Self::Hellinger => hellinger(p, q),
            Self::TotalVariation => total_variation(p, q),
        }
    }
}

/// Renormalize non-negative mass to sum to 1.
///
/// Negative and non-finite entries count as 0. A non-positive total falls
/// back to the uniform distribution.
pub fn normalize_mass(mass: &[f64]) -> Vec<f64> {
    let cleaned: Vec<f64> = mass
        .iter()
        .map(|&m| if m.is_finite() && m > 0.0 { m } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if total > 0.0 && total.is_finite() {
        cleaned.into_iter().map(|m| m / total).collect()
    } else if cleaned.is_empty() {
        cleaned
    } else {
        let uniform = 1.0 / cleaned.len() as f64;
        vec![uniform; cleaned.len()]
    }
}

/// `sum p * log2(p / q)` over cells where both operands are positive.
fn kl_bits(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .filter(|(a, b)| **a > 0.0 && **b > 0.0)
        .map(|(a, b)| a * (a / b).log2())
        .sum()
}

/// Jensen-Shannon divergence (base 2), clamped to `[0, 1]`.
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(a, b)| 0.5 * (a + b)).collect();
    let js = 0.5 * (kl_bits(p, &m) + kl_bits(q, &m));
    clamp_unit(js)
}

/// Hellinger distance `sqrt(sum (sqrt p - sqrt q)^2) / sqrt 2`, capped at 1.
pub fn hellinger(p: &[f64], q: &[f64]) -> f64 {
    let sum: f64 = p
        .iter()
        .zip(q)
        .map(|(a, b)| {
            let d = a.max(0.0).sqrt() - b.max(0.0).sqrt();
            d * d
        })
        .sum();
    clamp_unit(sum.sqrt() / std::f64::consts::SQRT_2)
}

/// Total variation distance `0.5 * sum |p - q|`, capped at 1.
pub fn total_variation(p: &[f64], q: &[f64]) -> f64 {
    let sum: f64 = p.iter().zip(q).map(|(a, b)| (a - b).abs()).sum();
    clamp_unit(0.5 * sum)
}

#[inline]
fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mass() {
        assert_eq!(normalize_mass(&[1.0, -3.0, f64::NAN, 3.0]), vec![0.25, 0.0, 0.0, 0.75]);
        assert_eq!(normalize_mass(&[0.0, -1.0]), vec![0.5, 0.5]);
        assert!(normalize_mass(&[]).is_empty());
    }

    #[test]
    fn test_identical_distributions_are_zero() {
        let p = [0.1, 0.2, 0.3, 0.4];
        for metric in [
            DivergenceMetric::JensenShannon,
            DivergenceMetric::Hellinger,
            DivergenceMetric::TotalVariation,
        ] {
            assert!(metric.between(&p, &p).abs() < 1e-12, "{}", metric);
        }
    }

    #[test]
    fn test_disjoint_distributions_are_one() {
        let p = [0.5, 0.5, 0.0, 0.0];
        let q = [0.0, 0.0, 0.5, 0.5];
        assert!((jensen_shannon(&p, &q) - 1.0).abs() < 1e-12);
        assert!((hellinger(&p, &q) - 1.0).abs() < 1e-12);
        assert!((total_variation(&p, &q) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_values() {
        let p = [0.5, 0.5];
        let q = [1.0, 0.0];
        assert!((total_variation(&p, &q) - 0.5).abs() < 1e-12);
        // m = [0.75, 0.25]; JS = 0.5*(0.5 log2(2/3) + 0.5 log2 2) + 0.5*log2(4/3)
        let expected = 0.5 * (0.5 * (0.5f64 / 0.75).log2() + 0.5 * 2.0f64.log2())
            + 0.5 * (1.0f64 / 0.75).log2();
        assert!((jensen_shannon(&p, &q) - expected).abs() < 1e-12);
    }
}

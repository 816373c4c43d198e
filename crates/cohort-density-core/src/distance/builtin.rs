//! Built-in distance metrics registered by `MetricRegistry::with_builtins`.

use super::DistanceMetric;

/// Closed set of metrics the registry provides out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMetric {
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Chebyshev,
    /// `1 - cosine similarity`; 1 when either vector has zero norm.
    Cosine,
    Canberra,
    BrayCurtis,
}

impl BuiltinMetric {
    pub const ALL: [BuiltinMetric; 7] = [
        Self::Euclidean,
        Self::SquaredEuclidean,
        Self::Manhattan,
        Self::Chebyshev,
        Self::Cosine,
        Self::Canberra,
        Self::BrayCurtis,
    ];
}

impl DistanceMetric for BuiltinMetric {
    fn name(&self) -> &str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SquaredEuclidean => "sqeuclidean",
            Self::Manhattan => "manhattan",
            Self::Chebyshev => "chebyshev",
            Self::Cosine => "cosine",
            Self::Canberra => "canberra",
            Self::BrayCurtis => "braycurtis",
        }
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let pairs = a.iter().zip(b);
        match self {
            Self::Euclidean => squared_euclidean(a, b).sqrt(),
            Self::SquaredEuclidean => squared_euclidean(a, b),
            Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Self::Chebyshev => pairs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
            Self::Cosine => {
                let (mut dot, mut na, mut nb) = (0.0, 0.0, 0.0);
                for (x, y) in pairs {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (na.sqrt() * nb.sqrt())
                }
            }
            Self::Canberra => pairs
                .map(|(x, y)| {
                    let denom = x.abs() + y.abs();
                    if denom == 0.0 {
                        0.0
                    } else {
                        (x - y).abs() / denom
                    }
                })
                .sum(),
            Self::BrayCurtis => {
                let (mut num, mut den) = (0.0, 0.0);
                for (x, y) in pairs {
                    num += (x - y).abs();
                    den += (x + y).abs();
                }
                if den == 0.0 {
                    0.0
                } else {
                    num / den
                }
            }
        }
    }
}

pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_values() {
        let a = [0.0, 3.0];
        let b = [4.0, 0.0];
        assert_eq!(BuiltinMetric::Euclidean.distance(&a, &b), 5.0);
        assert_eq!(BuiltinMetric::SquaredEuclidean.distance(&a, &b), 25.0);
        assert_eq!(BuiltinMetric::Manhattan.distance(&a, &b), 7.0);
        assert_eq!(BuiltinMetric::Chebyshev.distance(&a, &b), 4.0);
        assert!((BuiltinMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-12);
        assert_eq!(BuiltinMetric::Canberra.distance(&a, &b), 2.0);
        assert_eq!(BuiltinMetric::BrayCurtis.distance(&a, &b), 1.0);
    }

    #[test]
    fn test_zero_vectors_do_not_nan() {
        let z = [0.0, 0.0];
        for metric in BuiltinMetric::ALL {
            let d = metric.distance(&z, &z);
            assert!(d.is_finite(), "{} produced {}", metric.name(), d);
        }
    }
}

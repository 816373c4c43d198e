//! Axis definitions: rules reducing one feature vector to one scalar.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use xxhash_rust::xxh64::xxh64;

/// Stable string identity of an [`AxisSpec`].
///
/// Used as the key for cache entries, policy overrides and range caches.
/// Reference vectors contribute only their xxh64 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AxisKey(String);

impl AxisKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AxisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a feature vector is projected onto one axis of a 2D surface.
#[derive(Debug, Clone)]
pub enum AxisSpec {
    /// Sum of absolute components.
    L1Norm,
    /// Largest absolute component.
    LInfNorm,
    /// Arithmetic mean of the components.
    Mean,
    /// Largest component.
    Max,
    /// Smallest component.
    Min,
    /// Euclidean distance to the cohort mean vector.
    DistToMean,
    /// Cosine similarity to the cohort mean vector.
    CosineToMean,
    /// Named-metric distance to a reference vector (usually a cohort mean).
    MetricDistanceToMean {
        metric: String,
        reference: Option<Arc<[f64]>>,
    },
    /// Raw component value.
    ComponentAtDimension(usize),
    /// Projection onto the cohort's precomputed first principal component.
    Pc1Projection,
}

impl AxisSpec {
    /// Raw component axis.
    #[must_use]
    pub fn component(index: usize) -> Self {
        Self::ComponentAtDimension(index)
    }

    /// Named-metric distance to `reference`.
    #[must_use]
    pub fn metric_distance(metric: impl Into<String>, reference: Vec<f64>) -> Self {
        Self::MetricDistanceToMean {
            metric: metric.into(),
            reference: Some(Arc::from(reference)),
        }
    }

    /// Component index for `ComponentAtDimension`, `None` otherwise.
    pub fn component_index(&self) -> Option<usize> {
        match self {
            Self::ComponentAtDimension(i) => Some(*i),
            _ => None,
        }
    }

    /// Stable identity used for cache and override lookups.
    pub fn key(&self) -> AxisKey {
        let s = match self {
            Self::L1Norm => "l1".to_string(),
            Self::LInfNorm => "linf".to_string(),
            Self::Mean => "mean".to_string(),
            Self::Max => "max".to_string(),
            Self::Min => "min".to_string(),
            Self::DistToMean => "dist_to_mean".to_string(),
            Self::CosineToMean => "cosine_to_mean".to_string(),
            Self::MetricDistanceToMean { metric, reference } => {
                let ref_part = reference
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |r| format!("{:016x}", hash_reference(r)));
                format!("metric:{}:{}", metric.to_ascii_lowercase(), ref_part)
            }
            Self::ComponentAtDimension(i) => format!("dim:{}", i),
            Self::Pc1Projection => "pc1".to_string(),
        };
        AxisKey(s)
    }
}

fn hash_reference(reference: &[f64]) -> u64 {
    let mut bytes = Vec::with_capacity(reference.len() * 8);
    for v in reference {
        bytes.extend_from_slice(&v.to_bits().to_le_bytes());
    }
    xxh64(&bytes, 0)
}

impl PartialEq for AxisSpec {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AxisSpec {}

impl Hash for AxisSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1Norm => f.write_str("L1 norm"),
            Self::LInfNorm => f.write_str("L-inf norm"),
            Self::Mean => f.write_str("mean"),
            Self::Max => f.write_str("max"),
            Self::Min => f.write_str("min"),
            Self::DistToMean => f.write_str("distance to mean"),
            Self::CosineToMean => f.write_str("cosine to mean"),
            Self::MetricDistanceToMean { metric, .. } => {
                write!(f, "{} distance to reference", metric)
            }
            Self::ComponentAtDimension(i) => write!(f, "component[{}]", i),
            Self::Pc1Projection => f.write_str("PC1 projection"),
        }
    }
}

impl Serialize for AxisSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_distinct() {
        let axes = vec![
            AxisSpec::L1Norm,
            AxisSpec::LInfNorm,
            AxisSpec::Mean,
            AxisSpec::Max,
            AxisSpec::Min,
            AxisSpec::DistToMean,
            AxisSpec::CosineToMean,
            AxisSpec::metric_distance("euclidean", vec![0.0, 1.0]),
            AxisSpec::component(0),
            AxisSpec::component(1),
            AxisSpec::Pc1Projection,
        ];
        let keys: HashSet<AxisKey> = axes.iter().map(AxisSpec::key).collect();
        assert_eq!(keys.len(), axes.len());
    }

    #[test]
    fn test_reference_contributes_hash_only() {
        let a = AxisSpec::metric_distance("Euclidean", vec![1.0, 2.0]);
        let b = AxisSpec::metric_distance("euclidean", vec![1.0, 2.0]);
        let c = AxisSpec::metric_distance("euclidean", vec![1.0, 2.5]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.key().as_str().starts_with("metric:euclidean:"));

        let unset = AxisSpec::MetricDistanceToMean {
            metric: "cosine".into(),
            reference: None,
        };
        assert_eq!(unset.key().as_str(), "metric:cosine:none");
    }

    #[test]
    fn test_serializes_as_key() {
        let json = serde_json::to_string(&AxisSpec::component(7)).expect("serializes");
        assert_eq!(json, "\"dim:7\"");
    }
}

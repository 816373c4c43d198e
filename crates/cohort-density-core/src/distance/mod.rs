//! Named distance metrics resolved by name.
//!
//! The metric library itself is pluggable: the engine only needs a lookup
//! `name -> (vector, vector) -> distance`. `MetricRegistry` is an explicit
//! object built once at startup and shared by handle (`Arc`) with every
//! component that resolves metrics by name.

mod builtin;

pub use builtin::BuiltinMetric;
pub(crate) use builtin::squared_euclidean;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A distance between two equal-length vectors.
pub trait DistanceMetric: Send + Sync {
    /// Registry name (lowercase).
    fn name(&self) -> &str;

    /// Distance between `a` and `b`. Extra trailing components of the longer
    /// vector are ignored.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

/// Adapter turning a closure into a [`DistanceMetric`].
pub struct FnMetric<F> {
    name: String,
    f: F,
}

impl<F> FnMetric<F>
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            f,
        }
    }
}

impl<F> DistanceMetric for FnMetric<F>
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        (self.f)(a, b)
    }
}

/// Name-indexed collection of distance metrics. Lookup is case-insensitive.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    metrics: HashMap<String, Arc<dyn DistanceMetric>>,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl MetricRegistry {
    /// Registry with no metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every [`BuiltinMetric`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for metric in BuiltinMetric::ALL {
            registry.register(Arc::new(metric));
        }
        registry
    }

    /// Register (or replace) a metric under its own name.
    pub fn register(&mut self, metric: Arc<dyn DistanceMetric>) {
        self.metrics
            .insert(metric.name().to_ascii_lowercase(), metric);
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        self.register(Arc::new(FnMetric::new(name, f)));
    }

    /// Resolve a metric by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn DistanceMetric>> {
        self.metrics.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = MetricRegistry::with_builtins();
        assert_eq!(registry.names().len(), BuiltinMetric::ALL.len());
        assert!(registry.contains("EUCLIDEAN"));
        assert!(registry.get("mahalanobis").is_none());
    }

    #[test]
    fn test_register_closure() {
        let mut registry = MetricRegistry::new();
        registry.register_fn("Hamming", |a, b| {
            a.iter().zip(b).filter(|(x, y)| x != y).count() as f64
        });
        let metric = registry.get("hamming").expect("registered");
        assert_eq!(metric.name(), "hamming");
        assert_eq!(metric.distance(&[1.0, 2.0, 3.0], &[1.0, 0.0, 0.0]), 2.0);
    }
}

//! Cohorts: ordered, equal-dimensional collections of feature vectors.

use once_cell::sync::OnceCell;

use crate::error::{EngineError, EngineResult};

/// One row of a cohort.
pub type FeatureVector = Vec<f64>;

/// A named population of feature vectors.
///
/// Vectors are read-only once the cohort is built. The per-component mean is
/// computed lazily on first use and memoised, so every extraction pass over
/// the same cohort shares one mean vector.
#[derive(Debug, Clone)]
pub struct Cohort {
    label: String,
    vectors: Vec<FeatureVector>,
    dimension: usize,
    dataset_id: Option<String>,
    component_names: Option<Vec<String>>,
    pc1_loadings: Option<Vec<f64>>,
    mean: OnceCell<Vec<f64>>,
}

impl Cohort {
    /// Build a cohort, rejecting rows whose length differs from the first row.
    ///
    /// # Errors
    /// - `EngineError::DimensionMismatch` naming the first offending row length
    pub fn new(label: impl Into<String>, vectors: Vec<FeatureVector>) -> EngineResult<Self> {
        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        Ok(Self {
            label: label.into(),
            vectors,
            dimension,
            dataset_id: None,
            component_names: None,
            pc1_loadings: None,
            mean: OnceCell::new(),
        })
    }

    /// An empty cohort. Densities over it are all-zero grids.
    #[must_use]
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vectors: Vec::new(),
            dimension: 0,
            dataset_id: None,
            component_names: None,
            pc1_loadings: None,
            mean: OnceCell::new(),
        }
    }

    /// Attach a stable dataset id. Cache keys prefer it over the fingerprint.
    #[must_use]
    pub fn with_dataset_id(mut self, id: impl Into<String>) -> Self {
        self.dataset_id = Some(id.into());
        self
    }

    /// Attach per-component names, used as matrix labels.
    ///
    /// # Errors
    /// - `EngineError::DimensionMismatch` if the name count differs from the dimension
    pub fn with_component_names(mut self, names: Vec<String>) -> EngineResult<Self> {
        if names.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: names.len(),
            });
        }
        self.component_names = Some(names);
        Ok(self)
    }

    /// Attach precomputed first-principal-component loadings.
    ///
    /// # Errors
    /// - `EngineError::DimensionMismatch` if the loading count differs from the dimension
    pub fn with_pc1_loadings(mut self, loadings: Vec<f64>) -> EngineResult<Self> {
        if loadings.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: loadings.len(),
            });
        }
        self.pc1_loadings = Some(loadings);
        Ok(self)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Shared dimensionality of all vectors (0 for an empty cohort).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    pub fn pc1_loadings(&self) -> Option<&[f64]> {
        self.pc1_loadings.as_deref()
    }

    /// Display label for component `index`: its configured name, else `dim_{index}`.
    pub fn component_label(&self, index: usize) -> String {
        self.component_names
            .as_ref()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| format!("dim_{}", index))
    }

    /// Per-component mean, computed once and memoised. Empty for an empty cohort.
    pub fn mean(&self) -> &[f64] {
        self.mean.get_or_init(|| {
            let mut sums = vec![0.0; self.dimension];
            for v in &self.vectors {
                for (s, x) in sums.iter_mut().zip(v) {
                    *s += x;
                }
            }
            let n = self.vectors.len().max(1) as f64;
            sums.iter_mut().for_each(|s| *s /= n);
            sums
        })
    }

    /// Dense copy of one component across all rows. Out-of-range index yields zeros.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.vectors
            .iter()
            .map(|v| v.get(index).copied().unwrap_or(0.0))
            .collect()
    }
}

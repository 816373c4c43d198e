//! Key and entry types for the density cache.
//!
//! - [`DatasetKey`]: stable cohort id, or an xxHash64 fingerprint of its content
//! - [`CacheKey`]: dataset key + both axis keys + grid encoding
//! - [`CacheEntry`]: shared density result with TTL/LRU metadata

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::provenance::Provenance;
use crate::types::{AxisSpec, Cohort, DensityResult, GridSpec};

/// Process start instant for relative timestamp storage.
static START_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// Seed for dataset fingerprints.
const FINGERPRINT_SEED: u64 = 0x636f_686f_7274;

/// Identity of the data a density was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum DatasetKey {
    /// Caller-assigned stable id.
    Id(String),
    /// Content fingerprint.
    Fingerprint(u64),
}

impl DatasetKey {
    /// The cohort's stable id if it has one, else its fingerprint.
    pub fn for_cohort(cohort: &Cohort, max_rows: usize, max_cols: usize) -> Self {
        match cohort.dataset_id() {
            Some(id) => Self::Id(id.to_string()),
            None => Self::Fingerprint(fingerprint(cohort, max_rows, max_cols)),
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Fingerprint(fp) => write!(f, "fp:{:016x}", fp),
        }
    }
}

/// xxHash64 over row count, dimensionality, PC1 loadings and a strided
/// sample of at most `max_rows x max_cols` values.
///
/// Sampling keeps fingerprinting cost bounded for very large cohorts; two
/// cohorts differing only in unsampled cells share a fingerprint.
pub fn fingerprint(cohort: &Cohort, max_rows: usize, max_cols: usize) -> u64 {
    let n = cohort.len();
    let dim = cohort.dimension();
    let row_stride = stride(n, max_rows);
    let col_stride = stride(dim, max_cols);

    let mut buf = Vec::with_capacity(16 + 8 * max_rows.min(n) * max_cols.min(dim));
    buf.extend_from_slice(&(n as u64).to_le_bytes());
    buf.extend_from_slice(&(dim as u64).to_le_bytes());
    for v in cohort.vectors().iter().step_by(row_stride) {
        for x in v.iter().step_by(col_stride) {
            buf.extend_from_slice(&x.to_bits().to_le_bytes());
        }
    }
    if let Some(loadings) = cohort.pc1_loadings() {
        for l in loadings {
            buf.extend_from_slice(&l.to_bits().to_le_bytes());
        }
    }
    xxh64(&buf, FINGERPRINT_SEED)
}

fn stride(len: usize, cap: usize) -> usize {
    if cap == 0 || len <= cap {
        1
    } else {
        len.div_ceil(cap)
    }
}

/// Deterministic cache key: `{dataset}|{x}|{y}|{grid}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    dataset: DatasetKey,
    surface: String,
}

impl CacheKey {
    pub fn new(dataset: DatasetKey, x_axis: &AxisSpec, y_axis: &AxisSpec, grid: &GridSpec) -> Self {
        Self {
            dataset,
            surface: format!("{}|{}|{}", x_axis.key(), y_axis.key(), grid.encode()),
        }
    }

    pub fn dataset(&self) -> &DatasetKey {
        &self.dataset
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.dataset, self.surface)
    }
}

/// Cached density with optional provenance and access metadata.
///
/// `result` is shared, so every hit returns the same allocation.
#[derive(Debug)]
pub struct CacheEntry {
    pub result: Arc<DensityResult>,
    pub provenance: Option<Provenance>,
    created_at: Instant,
    /// Nanos since process start.
    last_accessed: AtomicU64,
    access_count: AtomicU32,
}

impl CacheEntry {
    #[must_use]
    pub fn new(result: Arc<DensityResult>, provenance: Option<Provenance>) -> Self {
        let now = START_INSTANT.elapsed().as_nanos() as u64;
        Self {
            result,
            provenance,
            created_at: Instant::now(),
            last_accessed: AtomicU64::new(now),
            access_count: AtomicU32::new(1),
        }
    }

    pub fn touch(&self) {
        let now = START_INSTANT.elapsed().as_nanos() as u64;
        self.last_accessed.store(now, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.age() >= ttl)
    }

    #[must_use]
    pub fn last_accessed(&self) -> Duration {
        Duration::from_nanos(self.last_accessed.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Helper Functions (NO MOCK DATA) ==========

    fn ramp_cohort(n: usize, dim: usize) -> Cohort {
        let rows = (0..n)
            .map(|i| (0..dim).map(|d| (i * dim + d) as f64 * 0.5).collect())
            .collect();
        Cohort::new("ramp", rows).expect("valid")
    }

    #[test]
    fn test_fingerprint_is_content_addressed() {
        println!("BEFORE: fingerprinting two identical cohorts with different labels");
        let a = ramp_cohort(50, 3);
        let b = Cohort::new("other-label", a.vectors().to_vec()).expect("valid");
        let fa = fingerprint(&a, 256, 64);
        let fb = fingerprint(&b, 256, 64);
        println!("AFTER: a={:#x} b={:#x}", fa, fb);
        assert_eq!(fa, fb);

        let mut rows = a.vectors().to_vec();
        rows[0][0] += 1.0;
        let changed = Cohort::new("ramp", rows).expect("valid");
        assert_ne!(fa, fingerprint(&changed, 256, 64));
    }

    #[test]
    fn test_fingerprint_includes_shape() {
        let a = ramp_cohort(10, 4);
        let truncated = Cohort::new("ramp", a.vectors()[..9].to_vec()).expect("valid");
        assert_ne!(fingerprint(&a, 2, 2), fingerprint(&truncated, 2, 2));
    }

    #[test]
    fn test_stable_id_preferred() {
        let cohort = ramp_cohort(5, 2).with_dataset_id("trial-42");
        let key = DatasetKey::for_cohort(&cohort, 256, 64);
        assert_eq!(key, DatasetKey::Id("trial-42".into()));
        assert_eq!(key.to_string(), "id:trial-42");
    }

    #[test]
    fn test_cache_key_encoding() {
        let key = CacheKey::new(
            DatasetKey::Id("d".into()),
            &AxisSpec::component(0),
            &AxisSpec::L1Norm,
            &GridSpec::new(16, 16),
        );
        assert_eq!(key.to_string(), "id:d|dim:0|l1|16x16|x[auto,auto]|y[auto,auto]");
    }

    #[test]
    fn test_entry_expiry_and_touch() {
        let grid = GridSpec::new(2, 2);
        let computation = crate::density::compute_from_pairs(&[0.0], &[0.0], &grid, 1e-9);
        let result = Arc::new(computation.result);
        let entry = CacheEntry::new(result, None);
        assert!(!entry.is_expired(None));
        assert!(!entry.is_expired(Some(Duration::from_secs(60))));
        assert!(entry.is_expired(Some(Duration::ZERO)));
        entry.touch();
        assert_eq!(entry.access_count(), 2);
    }
}

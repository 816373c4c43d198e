//! DensityCache implementation with LRU eviction and optional TTL.
//!
//! # Architecture
//!
//! - LinkedHashMap keeps access order for LRU semantics
//! - One RwLock guards the map; lookups that refresh recency take the write
//!   lock, `contains`/`len`/`provenance_for` take the read lock
//! - Atomic counters provide lock-free metrics updates
//! - Densities are computed outside any lock; the insert re-checks for a
//!   racing writer and keeps the first stored result

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use linked_hash_map::LinkedHashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error};

use crate::cache::types::{CacheEntry, CacheKey, DatasetKey};
use crate::config::CacheConfig;
use crate::density::{DensityComputation, DensityEngine};
use crate::error::{EngineError, EngineResult};
use crate::provenance::{Provenance, ProvenanceBuilder};
use crate::types::{AxisSpec, Cohort, DensityResult, GridSpec};

/// Thread-safe cache metrics with atomic counters.
///
/// Relaxed ordering throughout: the counters are statistical.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Entries dropped to stay within `max_entries`.
    pub evictions: AtomicU64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: AtomicU64,
    pub inserts: AtomicU64,
}

impl CacheMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
    pub entries: usize,
    /// `hits / (hits + misses)`, 0 before any access.
    pub hit_rate: f64,
}

/// Outcome of a cache-aware density request.
#[derive(Debug, Clone)]
pub struct CachedDensity {
    pub density: Arc<DensityResult>,
    /// True when the result came from an existing entry.
    pub from_cache: bool,
    /// Provenance stored with the entry (or built for a fresh computation).
    pub provenance: Option<Provenance>,
}

/// Thread-safe LRU + TTL cache of computed density surfaces.
///
/// # Eviction Strategy
///
/// 1. TTL expiration: entries older than `ttl_seconds` are removed on access
/// 2. LRU eviction: when `max_entries` is reached the least recently used entry goes
pub struct DensityCache {
    entries: RwLock<LinkedHashMap<CacheKey, CacheEntry>>,
    config: CacheConfig,
    ttl: Option<Duration>,
    metrics: CacheMetrics,
    engine: DensityEngine,
}

impl std::fmt::Debug for DensityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DensityCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl DensityCache {
    /// Create a cache computing misses with `engine`.
    ///
    /// # Errors
    /// - `EngineError::ConfigError` if `max_entries` is 0
    /// - `EngineError::ConfigError` if `ttl_seconds` is `Some(0)`
    pub fn new(config: CacheConfig, engine: DensityEngine) -> EngineResult<Self> {
        if config.max_entries == 0 {
            error!("DensityCache config error: max_entries cannot be 0");
            return Err(EngineError::ConfigError(
                "max_entries cannot be 0".to_string(),
            ));
        }
        if config.ttl_seconds == Some(0) {
            error!("DensityCache config error: ttl_seconds cannot be 0");
            return Err(EngineError::ConfigError(
                "ttl_seconds cannot be 0 (use None for no expiration)".to_string(),
            ));
        }

        Ok(Self {
            entries: RwLock::new(LinkedHashMap::new()),
            ttl: config.ttl_seconds.map(Duration::from_secs),
            config,
            metrics: CacheMetrics::new(),
            engine,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn engine(&self) -> &DensityEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Dataset key for `cohort` under this cache's fingerprint sampling.
    pub fn dataset_key(&self, cohort: &Cohort) -> DatasetKey {
        DatasetKey::for_cohort(
            cohort,
            self.config.fingerprint_max_rows,
            self.config.fingerprint_max_cols,
        )
    }

    /// Cache key for one surface request.
    pub fn key_for(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
    ) -> CacheKey {
        CacheKey::new(self.dataset_key(cohort), x_axis, y_axis, grid)
    }

    /// Cached density for the request, computing and storing it on a miss.
    /// The stored entry carries no provenance.
    pub fn get_or_compute(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
    ) -> CachedDensity {
        self.get_or_compute_inner(cohort, x_axis, y_axis, grid, |_, _| None)
    }

    /// As [`get_or_compute`](Self::get_or_compute), storing the provenance
    /// built by `make_provenance` from a fresh computation and its duration.
    pub fn get_or_compute_with_provenance<F>(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
        make_provenance: F,
    ) -> CachedDensity
    where
        F: FnOnce(&DensityComputation, Duration) -> Provenance,
    {
        self.get_or_compute_inner(cohort, x_axis, y_axis, grid, |c, d| {
            Some(make_provenance(c, d))
        })
    }

    /// Cached density with provenance describing this request.
    ///
    /// `request` builds the caller's provenance. A fresh computation stores
    /// and returns it with checks and timing filled in. A result served from
    /// an existing entry, including a racing writer's, gets a new record
    /// from `request` linked to the stored one through `origin`.
    pub fn get_or_compute_for_request<B>(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
        request: B,
    ) -> CachedDensity
    where
        B: Fn() -> ProvenanceBuilder,
    {
        let built_here = Cell::new(None);
        let out = self.get_or_compute_with_provenance(cohort, x_axis, y_axis, grid, |c, d| {
            let provenance = request()
                .numeric_checks(c.checks)
                .compute_millis(d.as_millis() as u64)
                .build();
            built_here.set(Some(provenance.id));
            provenance
        });

        let provenance = match out.provenance {
            Some(own) if built_here.get() == Some(own.id) => own,
            Some(stored) => request().served_from(&stored).build(),
            None => request().build(),
        };
        CachedDensity {
            provenance: Some(provenance),
            ..out
        }
    }

    fn get_or_compute_inner<F>(
        &self,
        cohort: &Cohort,
        x_axis: &AxisSpec,
        y_axis: &AxisSpec,
        grid: &GridSpec,
        make_provenance: F,
    ) -> CachedDensity
    where
        F: FnOnce(&DensityComputation, Duration) -> Option<Provenance>,
    {
        // Empty cohorts bypass the cache entirely.
        if cohort.is_empty() {
            let start = Instant::now();
            let computation = self.engine.compute_with_checks(cohort, x_axis, y_axis, grid);
            let provenance = make_provenance(&computation, start.elapsed());
            return CachedDensity {
                density: Arc::new(computation.result),
                from_cache: false,
                provenance,
            };
        }

        let key = self.key_for(cohort, x_axis, y_axis, grid);
        if let Some(hit) = self.lookup(&key) {
            debug!(key = %key, "density cache hit");
            return hit;
        }
        debug!(key = %key, "density cache miss");

        let start = Instant::now();
        let computation = self.engine.compute_with_checks(cohort, x_axis, y_axis, grid);
        let provenance = make_provenance(&computation, start.elapsed());
        let density = Arc::new(computation.result);

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get_refresh(&key) {
            if !existing.is_expired(self.ttl) {
                // A racing writer stored this key first; keep its result.
                existing.touch();
                return CachedDensity {
                    density: Arc::clone(&existing.result),
                    from_cache: false,
                    provenance: existing.provenance.clone(),
                };
            }
        }
        self.insert_locked(&mut entries, key, Arc::clone(&density), provenance.clone());

        CachedDensity {
            density,
            from_cache: false,
            provenance,
        }
    }

    /// Refreshing lookup; records a hit or a miss.
    fn lookup(&self, key: &CacheKey) -> Option<CachedDensity> {
        let mut entries = self.entries.write();
        let expired = match entries.get_refresh(key) {
            None => {
                self.metrics.record_miss();
                return None;
            }
            Some(entry) if entry.is_expired(self.ttl) => true,
            Some(entry) => {
                entry.touch();
                self.metrics.record_hit();
                return Some(CachedDensity {
                    density: Arc::clone(&entry.result),
                    from_cache: true,
                    provenance: entry.provenance.clone(),
                });
            }
        };

        if expired {
            entries.remove(key);
            self.metrics.record_expiration();
            debug!(key = %key, "density cache entry expired");
        }
        self.metrics.record_miss();
        None
    }

    /// Get a density by key, updating LRU order. Expired entries are removed.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DensityResult>> {
        self.lookup(key).map(|hit| hit.density)
    }

    /// Store a density, replacing any entry under the same key.
    pub fn put(&self, key: CacheKey, density: Arc<DensityResult>, provenance: Option<Provenance>) {
        let mut entries = self.entries.write();
        entries.remove(&key);
        self.insert_locked(&mut entries, key, density, provenance);
    }

    fn insert_locked(
        &self,
        entries: &mut LinkedHashMap<CacheKey, CacheEntry>,
        key: CacheKey,
        density: Arc<DensityResult>,
        provenance: Option<Provenance>,
    ) {
        if entries.remove(&key).is_some() {
            // Stale (expired) entry under the same key.
            self.metrics.record_expiration();
        }
        while entries.len() >= self.config.max_entries {
            match entries.pop_front() {
                Some((evicted, _)) => {
                    self.metrics.record_eviction();
                    debug!(key = %evicted, "evicted least recently used density");
                }
                None => break,
            }
        }
        entries.insert(key, CacheEntry::new(density, provenance));
        self.metrics.record_insert();
    }

    /// True if an entry exists under `key`. Does not refresh recency or check TTL.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Provenance stored with an unexpired entry.
    #[must_use]
    pub fn provenance_for(&self, key: &CacheKey) -> Option<Provenance> {
        self.entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl))
            .and_then(|entry| entry.provenance.clone())
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Remove every entry computed from `dataset`. Returns the number removed.
    pub fn invalidate_dataset(&self, dataset: &DatasetKey) -> usize {
        let mut entries = self.entries.write();
        let doomed: Vec<CacheKey> = entries
            .keys()
            .filter(|key| key.dataset() == dataset)
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        debug!(dataset = %dataset, removed = doomed.len(), "invalidated dataset");
        doomed.len()
    }

    /// Clear all entries and reset metrics.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.metrics.reset();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters and current size.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.metrics.hits.load(Ordering::Relaxed);
        let misses = self.metrics.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            expirations: self.metrics.expirations.load(Ordering::Relaxed),
            inserts: self.metrics.inserts.load(Ordering::Relaxed),
            entries: self.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{Operation, SurfaceKind};
    use std::thread;

    // ========== Helper Functions (NO MOCK DATA) ==========

    fn cohort(label: &str, offset: f64) -> Cohort {
        let rows = (0..120)
            .map(|i| {
                let t = i as f64 * 0.1 + offset;
                vec![t, t.sin(), (t * 0.5).cos()]
            })
            .collect();
        Cohort::new(label, rows).expect("valid")
    }

    fn cache(max_entries: usize, ttl_seconds: Option<u64>) -> DensityCache {
        let config = CacheConfig {
            max_entries,
            ttl_seconds,
            ..CacheConfig::default()
        };
        DensityCache::new(config, DensityEngine::default()).expect("valid config")
    }

    fn x() -> AxisSpec {
        AxisSpec::component(0)
    }

    fn y() -> AxisSpec {
        AxisSpec::component(1)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let zero = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        assert!(DensityCache::new(zero, DensityEngine::default()).is_err());
        let ttl = CacheConfig {
            ttl_seconds: Some(0),
            ..CacheConfig::default()
        };
        assert!(DensityCache::new(ttl, DensityEngine::default()).is_err());
    }

    #[test]
    fn test_second_call_is_hit_and_identical() {
        let cache = cache(8, None);
        let a = cohort("A", 0.0);
        let grid = GridSpec::new(16, 16);

        println!("BEFORE: stats={:?}", cache.stats());
        let first = cache.get_or_compute(&a, &x(), &y(), &grid);
        let second = cache.get_or_compute(&a, &x(), &y(), &grid);
        println!("AFTER: stats={:?}", cache.stats());

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.density, &second.density));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_cohort_bypasses_cache() {
        let cache = cache(8, None);
        let out = cache.get_or_compute(&Cohort::empty("none"), &x(), &y(), &GridSpec::new(4, 4));
        assert!(!out.from_cache);
        assert_eq!(out.density.total_mass(), 0.0);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_lru_eviction_respects_access_order() {
        let cache = cache(2, None);
        let grid = GridSpec::new(8, 8);
        let (a, b, c) = (cohort("A", 0.0), cohort("B", 1.0), cohort("C", 2.0));

        cache.get_or_compute(&a, &x(), &y(), &grid);
        cache.get_or_compute(&b, &x(), &y(), &grid);
        // Touch A so B becomes least recently used.
        assert!(cache.get_or_compute(&a, &x(), &y(), &grid).from_cache);
        cache.get_or_compute(&c, &x(), &y(), &grid);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.contains(&cache.key_for(&a, &x(), &y(), &grid)));
        assert!(!cache.contains(&cache.key_for(&b, &x(), &y(), &grid)));
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = cache(8, Some(1));
        let a = cohort("A", 0.0);
        let grid = GridSpec::new(8, 8);
        let key = cache.key_for(&a, &x(), &y(), &grid);
        cache.get_or_compute(&a, &x(), &y(), &grid);
        assert!(cache.get(&key).is_some());

        thread::sleep(Duration::from_millis(1100));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_provenance_stored_and_returned() {
        let cache = cache(8, None);
        let a = cohort("A", 0.0);
        let grid = GridSpec::new(8, 8);
        let key = cache.key_for(&a, &x(), &y(), &grid);

        let fresh = cache.get_or_compute_with_provenance(&a, &x(), &y(), &grid, |c, d| {
            Provenance::builder(Operation::Baseline, SurfaceKind::Pdf)
                .numeric_checks(c.checks)
                .compute_millis(d.as_millis() as u64)
                .cohort_label("A")
                .build()
        });
        let stored = cache.provenance_for(&key).expect("provenance stored");
        assert_eq!(Some(&stored), fresh.provenance.as_ref());

        let hit = cache.get_or_compute(&a, &x(), &y(), &grid);
        assert_eq!(hit.provenance.map(|p| p.id), Some(stored.id));

        // The provenance-less overload stores None.
        let other_grid = GridSpec::new(4, 4);
        cache.get_or_compute(&a, &x(), &y(), &other_grid);
        assert!(cache
            .provenance_for(&cache.key_for(&a, &x(), &y(), &other_grid))
            .is_none());
    }

    #[test]
    fn test_request_provenance_on_hit_links_stored_record() {
        let cache = cache(8, None);
        let a = cohort("A", 0.0);
        let grid = GridSpec::new(8, 8);
        let request = |recipe: &'static str| {
            move || {
                Provenance::builder(Operation::Baseline, SurfaceKind::Pdf)
                    .recipe_name(Some(recipe))
                    .cohort_label("A")
            }
        };

        let first = cache.get_or_compute_for_request(&a, &x(), &y(), &grid, request("first"));
        let first_prov = first.provenance.expect("provenance");
        println!("BEFORE: recipe={:?} origin={:?}", first_prov.recipe_name, first_prov.origin);
        assert!(!first.from_cache);
        assert!(first_prov.origin.is_none());
        assert!(first_prov.numeric_checks.is_some());

        let second = cache.get_or_compute_for_request(&a, &x(), &y(), &grid, request("second"));
        let second_prov = second.provenance.expect("provenance");
        println!("AFTER: recipe={:?} origin={:?}", second_prov.recipe_name, second_prov.origin);
        assert!(second.from_cache);
        assert_eq!(second_prov.recipe_name.as_deref(), Some("second"));
        assert_eq!(second_prov.origin, Some(first_prov.id));
        assert_eq!(second_prov.numeric_checks, first_prov.numeric_checks);

        let key = cache.key_for(&a, &x(), &y(), &grid);
        let stored = cache.provenance_for(&key).expect("stored");
        assert_eq!(stored.id, first_prov.id);
    }

    #[test]
    fn test_invalidate_and_invalidate_dataset() {
        let cache = cache(16, None);
        let a = cohort("A", 0.0).with_dataset_id("a");
        let b = cohort("B", 5.0).with_dataset_id("b");
        for bins in [4, 8, 16] {
            cache.get_or_compute(&a, &x(), &y(), &GridSpec::new(bins, bins));
        }
        cache.get_or_compute(&b, &x(), &y(), &GridSpec::new(4, 4));

        let key = cache.key_for(&b, &x(), &y(), &GridSpec::new(4, 4));
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));

        assert_eq!(cache.invalidate_dataset(&DatasetKey::Id("a".into())), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_get_and_clear() {
        let cache = cache(4, None);
        let a = cohort("A", 0.0);
        let grid = GridSpec::new(8, 8);
        let key = cache.key_for(&a, &x(), &y(), &grid);
        let density = Arc::new(cache.engine().compute_joint_density(&a, &x(), &y(), &grid));

        cache.put(key.clone(), Arc::clone(&density), None);
        let got = cache.get(&key).expect("stored");
        assert!(Arc::ptr_eq(&got, &density));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_concurrent_get_or_compute() {
        let cache = Arc::new(cache(64, None));
        let a = Arc::new(cohort("A", 0.0));
        let grid = GridSpec::new(12, 12);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let a = Arc::clone(&a);
                thread::spawn(move || cache.get_or_compute(&a, &x(), &y(), &grid).density)
            })
            .collect();
        let results: Vec<Arc<DensityResult>> = handles
            .into_iter()
            .map(|h| h.join().expect("thread completed"))
            .collect();

        for r in &results {
            assert_eq!(r.as_ref(), results[0].as_ref());
        }
        assert_eq!(cache.len(), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 8);
        assert_eq!(stats.inserts, 1);
    }
}

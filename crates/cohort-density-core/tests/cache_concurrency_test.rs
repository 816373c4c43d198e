//! Concurrency behaviour of the density cache under real parallel load.

use std::sync::Arc;
use std::thread;

use cohort_density_core::{AxisSpec, CacheConfig, DensityCache, DensityEngine, GridSpec};
use cohort_density_test_utils::{correlated_cohort, gaussian_cohort};

const THREADS: usize = 8;

#[test]
fn concurrent_requests_share_one_result() {
    let cache = Arc::new(
        DensityCache::new(CacheConfig::default(), DensityEngine::default()).expect("valid config"),
    );
    let cohort = Arc::new(correlated_cohort("C", 2000, 5));
    let grid = GridSpec::new(32, 32);
    let (x, y) = (AxisSpec::component(0), AxisSpec::component(1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let cohort = Arc::clone(&cohort);
            let (x, y) = (x.clone(), y.clone());
            thread::spawn(move || {
                (0..10)
                    .map(|_| cache.get_or_compute(&cohort, &x, &y, &grid).density)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("worker thread"))
        .collect();

    let stats = cache.stats();
    println!("AFTER: {:?}", stats);
    assert_eq!(cache.len(), 1);
    assert_eq!(stats.hits + stats.misses, (THREADS * 10) as u64);
    assert!(stats.hits >= (THREADS * 10 - THREADS) as u64);
    // Racing misses return the stored winner, so every caller holds one surface.
    assert!(results.iter().all(|d| Arc::ptr_eq(d, &results[0])));
}

#[test]
fn lru_bound_holds_under_parallel_inserts() {
    let config = CacheConfig {
        max_entries: 16,
        ..CacheConfig::default()
    };
    let cache =
        Arc::new(DensityCache::new(config, DensityEngine::default()).expect("valid config"));
    let cohort = Arc::new(gaussian_cohort("G", 300, 8, &[], 17));

    thread::scope(|s| {
        for t in 0..THREADS {
            let cache = &cache;
            let cohort = &cohort;
            s.spawn(move || {
                for i in 0..8 {
                    let x = AxisSpec::component(i);
                    let y = AxisSpec::component((i + t) % 8);
                    cache.get_or_compute(cohort, &x, &y, &GridSpec::new(6 + t, 6));
                }
            });
        }
    });

    let stats = cache.stats();
    println!(
        "AFTER: entries={} evictions={} inserts={}",
        cache.len(),
        stats.evictions,
        stats.inserts
    );
    assert!(cache.len() <= 16);
    assert_eq!(stats.inserts - stats.evictions, cache.len() as u64);
}

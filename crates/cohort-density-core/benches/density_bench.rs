//! Density, scoring and cache benchmark suite.
//!
//! - joint density: 10k x 8 cohort over 64x64 and 256x256 grids
//! - dependence scoring: every metric over 4k samples
//! - cache: hit path vs. recompute

use std::sync::Arc;

use cohort_density_core::scoring::{
    distance_correlation, kendall_tau_b_abs, normalized_mutual_information, pearson_abs,
};
use cohort_density_core::{
    AxisSpec, CacheConfig, DensityCache, DensityEngine, GridSpec, MetricRegistry, PairScorer,
    ScorerConfig,
};
use cohort_density_test_utils::{correlated_cohort, gaussian_cohort};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// =============================================================================
// Density
// =============================================================================

fn bench_joint_density(c: &mut Criterion) {
    let engine = DensityEngine::default();
    let cohort = gaussian_cohort("bench", 10_000, 8, &[0.0, 1.0], 42);
    let (x, y) = (AxisSpec::component(0), AxisSpec::component(1));

    let mut group = c.benchmark_group("joint_density");
    group.throughput(Throughput::Elements(cohort.len() as u64));
    for bins in [64usize, 256] {
        let grid = GridSpec::new(bins, bins);
        group.bench_with_input(BenchmarkId::from_parameter(bins), &grid, |b, grid| {
            b.iter(|| engine.compute_joint_density(black_box(&cohort), &x, &y, grid))
        });
    }
    group.finish();

    let dist = AxisSpec::metric_distance("euclidean", cohort.mean().to_vec());
    c.bench_function("joint_density_l1_vs_euclidean_64", |b| {
        b.iter(|| {
            engine.compute_joint_density(
                black_box(&cohort),
                &AxisSpec::L1Norm,
                &dist,
                &GridSpec::new(64, 64),
            )
        })
    });
}

// =============================================================================
// Scoring
// =============================================================================

fn bench_dependence(c: &mut Criterion) {
    let cohort = correlated_cohort("bench", 4_000, 7);
    let x = cohort.column(0);
    let y = cohort.column(3);

    let mut group = c.benchmark_group("dependence_4k");
    group.bench_function("pearson", |b| b.iter(|| pearson_abs(black_box(&x), black_box(&y))));
    group.bench_function("kendall_capped_2000", |b| {
        b.iter(|| kendall_tau_b_abs(black_box(&x), black_box(&y), 2000))
    });
    group.bench_function("nmi_16", |b| {
        b.iter(|| normalized_mutual_information(black_box(&x), black_box(&y), 16))
    });
    group.bench_function("dcor", |b| {
        b.iter(|| distance_correlation(black_box(&x), black_box(&y), 4000))
    });
    group.finish();

    let scorer = PairScorer::new(
        ScorerConfig::default(),
        Arc::new(MetricRegistry::with_builtins()),
    );
    c.bench_function("score_components_6d_pearson", |b| {
        b.iter(|| scorer.score_components(black_box(&cohort), 0, 5))
    });
}

// =============================================================================
// Cache
// =============================================================================

fn bench_cache(c: &mut Criterion) {
    let cohort = gaussian_cohort("bench", 10_000, 8, &[], 9);
    let (x, y) = (AxisSpec::component(2), AxisSpec::component(5));
    let grid = GridSpec::new(64, 64);
    let cache = DensityCache::new(CacheConfig::default(), DensityEngine::default())
        .expect("default cache config is valid");
    cache.get_or_compute(&cohort, &x, &y, &grid);

    c.bench_function("cache_hit_10k", |b| {
        b.iter(|| cache.get_or_compute(black_box(&cohort), &x, &y, &grid))
    });
    c.bench_function("cache_clear_then_miss_10k", |b| {
        b.iter(|| {
            cache.clear();
            cache.get_or_compute(black_box(&cohort), &x, &y, &grid)
        })
    });
}

criterion_group!(benches, bench_joint_density, bench_dependence, bench_cache);
criterion_main!(benches);

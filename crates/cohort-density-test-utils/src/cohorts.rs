//! REAL synthetic cohorts drawn from seeded distributions, NO MOCK DATA.
//!
//! Every generator takes an explicit seed and uses `ChaCha8Rng`, so a test
//! sees the same vectors on every platform and every run.

use cohort_density_core::Cohort;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Seeded RNG used by every generator in this crate.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` vectors of dimension `dim`, component `k` drawn from `N(means[k], 1)`.
/// Components beyond `means.len()` are `N(0, 1)`.
pub fn gaussian_cohort(label: &str, n: usize, dim: usize, means: &[f64], seed: u64) -> Cohort {
    let mut rng = seeded_rng(seed);
    let dists: Vec<Normal<f64>> = (0..dim)
        .map(|k| {
            let mean = means.get(k).copied().unwrap_or(0.0);
            Normal::new(mean, 1.0).expect("unit sigma is valid")
        })
        .collect();
    let rows = (0..n)
        .map(|_| dists.iter().map(|d| d.sample(&mut rng)).collect())
        .collect();
    Cohort::new(label, rows).expect("generated rows share one dimension")
}

/// `n` vectors with every component uniform on `[low, high)`.
pub fn uniform_cohort(label: &str, n: usize, dim: usize, low: f64, high: f64, seed: u64) -> Cohort {
    let mut rng = seeded_rng(seed);
    let dist = Uniform::new(low, high);
    let rows = (0..n)
        .map(|_| (0..dim).map(|_| dist.sample(&mut rng)).collect())
        .collect();
    Cohort::new(label, rows).expect("generated rows share one dimension")
}

/// Cohort with a known dependence structure over 6 components:
///
/// - 0: `t ~ N(0, 1)`
/// - 1: `2t + small noise` (near-linear)
/// - 2: `-t + moderate noise`
/// - 3: `t^2 + noise` (non-monotone)
/// - 4, 5: independent `N(0, 1)`
pub fn correlated_cohort(label: &str, n: usize, seed: u64) -> Cohort {
    let mut rng = seeded_rng(seed);
    let std_normal = Normal::new(0.0, 1.0).expect("unit sigma is valid");
    let rows = (0..n)
        .map(|_| {
            let t: f64 = std_normal.sample(&mut rng);
            let mut noise = || std_normal.sample(&mut rng);
            vec![
                t,
                2.0 * t + 0.05 * noise(),
                -t + 0.5 * noise(),
                t * t + 0.3 * noise(),
                noise(),
                noise(),
            ]
        })
        .collect();
    Cohort::new(label, rows).expect("generated rows share one dimension")
}

/// Rows of `cohort` in a seeded random order.
pub fn permuted(cohort: &Cohort, label: &str, seed: u64) -> Cohort {
    let mut rows = cohort.vectors().to_vec();
    rows.shuffle(&mut seeded_rng(seed));
    Cohort::new(label, rows).expect("rows come from a valid cohort")
}

/// `n` rows drawn from `cohort` with replacement.
pub fn bootstrap(cohort: &Cohort, label: &str, n: usize, seed: u64) -> Cohort {
    let mut rng = seeded_rng(seed);
    let source = cohort.vectors();
    let rows = (0..n)
        .map(|_| source[rng.gen_range(0..source.len())].clone())
        .collect();
    Cohort::new(label, rows).expect("rows come from a valid cohort")
}

//! Deterministic synthetic cohorts for cohort-density tests and benches.

pub mod cohorts;

pub use cohorts::{
    bootstrap, correlated_cohort, gaussian_cohort, permuted, seeded_rng, uniform_cohort,
};

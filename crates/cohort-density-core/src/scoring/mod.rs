//! Pair scoring: bounded dependence measures and the sufficiency guard.

mod dependence;
mod scorer;

pub use dependence::{
    distance_correlation, kendall_tau_b_abs, normalized_mutual_information, pearson_abs,
    stride_sample,
};
pub(crate) use scorer::{clamp_range, sort_scores};
pub use scorer::{
    candidate_pairs, sufficiency, DependenceMetric, PairScore, PairScorer, ScorerConfig,
    Sufficiency,
};

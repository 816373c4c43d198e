//! Validated, immutable batch configuration.

use std::fmt;

use serde::Serialize;

use crate::config::{ScoringConfig, MIN_BINS};
use crate::error::{EngineError, EngineResult};
use crate::provenance::SurfaceKind;
use crate::scoring::{DependenceMetric, ScorerConfig};
use crate::types::AxisSpec;

/// Which scored component pairs a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairSelection {
    All,
    TopKByScore,
    ThresholdByScore,
    /// Explicit axis pairs; only the whitelist entry point runs them.
    Whitelist,
}

/// How grid bounds are resolved for a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundsPolicy {
    Fixed01,
    DataMinMax,
    /// Ranges from a named [`CanonicalGridPolicy`](crate::grid::CanonicalGridPolicy).
    CanonicalByFeature,
}

/// Surfaces a comparison should produce differences for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputKind {
    Pdf,
    Cdf,
    Both,
}

impl OutputKind {
    pub fn wants_pdf(&self) -> bool {
        matches!(self, Self::Pdf | Self::Both)
    }

    pub fn wants_cdf(&self) -> bool {
        matches!(self, Self::Cdf | Self::Both)
    }

    pub fn surface_kind(&self) -> SurfaceKind {
        match self {
            Self::Pdf => SurfaceKind::Pdf,
            Self::Cdf => SurfaceKind::Cdf,
            Self::Both => SurfaceKind::PdfAndCdf,
        }
    }
}

/// Immutable recipe. Build with [`Recipe::builder`]; validation happens once,
/// in [`RecipeBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    name: String,
    description: Option<String>,
    pair_selection: PairSelection,
    top_k: Option<usize>,
    threshold: Option<f64>,
    whitelist: Vec<(AxisSpec, AxisSpec)>,
    bounds_policy: BoundsPolicy,
    canonical_policy_id: Option<String>,
    bins_x: usize,
    bins_y: usize,
    dependence_metric: DependenceMetric,
    min_avg_count_per_cell: f64,
    include_self_pairs: bool,
    ordered_pairs: bool,
    output_kind: OutputKind,
    use_cache: bool,
    component_start: usize,
    component_end: usize,
}

impl Recipe {
    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pair_selection(&self) -> PairSelection {
        self.pair_selection
    }

    pub fn top_k(&self) -> Option<usize> {
        self.top_k
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn whitelist(&self) -> &[(AxisSpec, AxisSpec)] {
        &self.whitelist
    }

    pub fn bounds_policy(&self) -> BoundsPolicy {
        self.bounds_policy
    }

    pub fn canonical_policy_id(&self) -> Option<&str> {
        self.canonical_policy_id.as_deref()
    }

    pub fn bins(&self) -> (usize, usize) {
        (self.bins_x, self.bins_y)
    }

    pub fn dependence_metric(&self) -> DependenceMetric {
        self.dependence_metric
    }

    pub fn min_avg_count_per_cell(&self) -> f64 {
        self.min_avg_count_per_cell
    }

    pub fn include_self_pairs(&self) -> bool {
        self.include_self_pairs
    }

    pub fn ordered_pairs(&self) -> bool {
        self.ordered_pairs
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Inclusive component range; clamped to the cohort at use.
    pub fn component_range(&self) -> (usize, usize) {
        (self.component_start, self.component_end)
    }

    /// Scorer settings derived from this recipe.
    pub fn scorer_config(&self, limits: &ScoringConfig) -> ScorerConfig {
        ScorerConfig {
            metric: self.dependence_metric,
            bins: Some((self.bins_x, self.bins_y)),
            min_avg_count_per_cell: self.min_avg_count_per_cell,
            include_self_pairs: self.include_self_pairs,
            ordered_pairs: self.ordered_pairs,
            limits: limits.clone(),
        }
    }

    /// JSON summary for audit logs.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?}, {}x{})",
            self.name, self.pair_selection, self.bounds_policy, self.bins_x, self.bins_y
        )
    }
}

/// Builder for [`Recipe`].
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    inner: Recipe,
}

impl RecipeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Recipe {
                name: name.into(),
                description: None,
                pair_selection: PairSelection::All,
                top_k: None,
                threshold: None,
                whitelist: Vec::new(),
                bounds_policy: BoundsPolicy::DataMinMax,
                canonical_policy_id: None,
                bins_x: 64,
                bins_y: 64,
                dependence_metric: DependenceMetric::Pearson,
                min_avg_count_per_cell: 0.0,
                include_self_pairs: false,
                ordered_pairs: false,
                output_kind: OutputKind::Both,
                use_cache: true,
                component_start: 0,
                component_end: usize::MAX,
            },
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.inner.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn select_all(mut self) -> Self {
        self.inner.pair_selection = PairSelection::All;
        self
    }

    #[must_use]
    pub fn top_k(mut self, k: usize) -> Self {
        self.inner.pair_selection = PairSelection::TopKByScore;
        self.inner.top_k = Some(k);
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.inner.pair_selection = PairSelection::ThresholdByScore;
        self.inner.threshold = Some(threshold);
        self
    }

    /// Set the selection mode without its parameter (validated at build).
    #[must_use]
    pub fn pair_selection(mut self, selection: PairSelection) -> Self {
        self.inner.pair_selection = selection;
        self
    }

    #[must_use]
    pub fn whitelist(mut self, pairs: Vec<(AxisSpec, AxisSpec)>) -> Self {
        self.inner.pair_selection = PairSelection::Whitelist;
        self.inner.whitelist = pairs;
        self
    }

    #[must_use]
    pub fn bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.inner.bounds_policy = policy;
        self
    }

    /// Use `CanonicalByFeature` with the named policy.
    #[must_use]
    pub fn canonical_policy(mut self, id: impl Into<String>) -> Self {
        self.inner.bounds_policy = BoundsPolicy::CanonicalByFeature;
        self.inner.canonical_policy_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn bins(mut self, bins_x: usize, bins_y: usize) -> Self {
        self.inner.bins_x = bins_x;
        self.inner.bins_y = bins_y;
        self
    }

    #[must_use]
    pub fn dependence_metric(mut self, metric: DependenceMetric) -> Self {
        self.inner.dependence_metric = metric;
        self
    }

    #[must_use]
    pub fn min_avg_count_per_cell(mut self, threshold: f64) -> Self {
        self.inner.min_avg_count_per_cell = threshold;
        self
    }

    #[must_use]
    pub fn include_self_pairs(mut self, include: bool) -> Self {
        self.inner.include_self_pairs = include;
        self
    }

    #[must_use]
    pub fn ordered_pairs(mut self, ordered: bool) -> Self {
        self.inner.ordered_pairs = ordered;
        self
    }

    #[must_use]
    pub fn output_kind(mut self, kind: OutputKind) -> Self {
        self.inner.output_kind = kind;
        self
    }

    #[must_use]
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.inner.use_cache = enabled;
        self
    }

    #[must_use]
    pub fn component_range(mut self, start: usize, end: usize) -> Self {
        self.inner.component_start = start;
        self.inner.component_end = end;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    /// `EngineError::InvalidRecipe` naming the first offending field.
    pub fn build(self) -> EngineResult<Recipe> {
        let r = self.inner;

        if r.name.trim().is_empty() {
            return Err(EngineError::invalid_recipe("name", "must not be blank"));
        }
        if r.bins_x < MIN_BINS || r.bins_y < MIN_BINS {
            return Err(EngineError::invalid_recipe(
                "bins",
                format!("must be >= {} (got {}x{})", MIN_BINS, r.bins_x, r.bins_y),
            ));
        }
        match r.pair_selection {
            PairSelection::TopKByScore if !r.top_k.is_some_and(|k| k > 0) => {
                return Err(EngineError::invalid_recipe(
                    "top_k",
                    "must be > 0 for TopKByScore",
                ));
            }
            PairSelection::ThresholdByScore if !r.threshold.is_some_and(f64::is_finite) => {
                return Err(EngineError::invalid_recipe(
                    "threshold",
                    "a finite threshold is required for ThresholdByScore",
                ));
            }
            PairSelection::Whitelist if r.whitelist.is_empty() => {
                return Err(EngineError::invalid_recipe(
                    "whitelist",
                    "must not be empty for Whitelist selection",
                ));
            }
            _ => {}
        }
        if r.bounds_policy == BoundsPolicy::CanonicalByFeature
            && !r
                .canonical_policy_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
        {
            return Err(EngineError::invalid_recipe(
                "canonical_policy_id",
                "must not be blank for CanonicalByFeature",
            ));
        }
        if r.component_start > r.component_end {
            return Err(EngineError::invalid_recipe(
                "component_range",
                format!("start {} exceeds end {}", r.component_start, r.component_end),
            ));
        }
        if !r.min_avg_count_per_cell.is_finite() || r.min_avg_count_per_cell < 0.0 {
            return Err(EngineError::invalid_recipe(
                "min_avg_count_per_cell",
                "must be finite and >= 0",
            ));
        }

        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: EngineResult<Recipe>) -> String {
        match result {
            Err(EngineError::InvalidRecipe { field, .. }) => field,
            other => panic!("expected InvalidRecipe, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let recipe = Recipe::builder("baseline").build().expect("valid");
        assert_eq!(recipe.pair_selection(), PairSelection::All);
        assert_eq!(recipe.bounds_policy(), BoundsPolicy::DataMinMax);
        assert_eq!(recipe.bins(), (64, 64));
        assert!(recipe.use_cache());
        assert!(recipe.output_kind().wants_pdf() && recipe.output_kind().wants_cdf());
    }

    #[test]
    fn test_each_rule_rejects() {
        assert_eq!(field_of(Recipe::builder("  ").build()), "name");
        assert_eq!(field_of(Recipe::builder("r").bins(1, 8).build()), "bins");
        assert_eq!(field_of(Recipe::builder("r").top_k(0).build()), "top_k");
        assert_eq!(
            field_of(Recipe::builder("r").pair_selection(PairSelection::TopKByScore).build()),
            "top_k"
        );
        assert_eq!(field_of(Recipe::builder("r").threshold(f64::NAN).build()), "threshold");
        assert_eq!(field_of(Recipe::builder("r").whitelist(vec![]).build()), "whitelist");
        assert_eq!(
            field_of(Recipe::builder("r").canonical_policy(" ").build()),
            "canonical_policy_id"
        );
        assert_eq!(
            field_of(
                Recipe::builder("r")
                    .bounds_policy(BoundsPolicy::CanonicalByFeature)
                    .build()
            ),
            "canonical_policy_id"
        );
        assert_eq!(
            field_of(Recipe::builder("r").component_range(4, 2).build()),
            "component_range"
        );
        assert_eq!(
            field_of(Recipe::builder("r").min_avg_count_per_cell(-1.0).build()),
            "min_avg_count_per_cell"
        );
    }

    #[test]
    fn test_scorer_config_and_json() {
        let recipe = Recipe::builder("ranked")
            .description("top pairs by dcor")
            .top_k(5)
            .dependence_metric(DependenceMetric::DistanceCorrelation)
            .bins(32, 16)
            .min_avg_count_per_cell(3.0)
            .build()
            .expect("valid");
        let config = recipe.scorer_config(&ScoringConfig::default());
        assert_eq!(config.bins, Some((32, 16)));
        assert_eq!(config.metric, DependenceMetric::DistanceCorrelation);

        let json = recipe.to_json().expect("serializes");
        assert!(json.contains("\"TopKByScore\""));
        assert!(json.contains("\"ranked\""));
    }

    #[test]
    fn test_whitelist_serializes_axis_keys() {
        let recipe = Recipe::builder("wl")
            .whitelist(vec![(AxisSpec::component(1), AxisSpec::Pc1Projection)])
            .build()
            .expect("valid");
        let json = recipe.to_json().expect("serializes");
        assert!(json.contains("\"dim:1\""));
        assert!(json.contains("\"pc1\""));
    }
}

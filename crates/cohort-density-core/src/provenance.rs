//! Immutable audit records describing how a surface or matrix was produced.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::types::GridSpec;

/// What kind of computation produced the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Baseline,
    Difference,
    Divergence,
    Similarity,
}

/// Shape of the produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SurfaceKind {
    Pdf,
    Cdf,
    PdfAndCdf,
    ComparisonSigned,
    DivergenceMatrix,
    SimilarityMatrix,
}

/// How the grid bounds were chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Alignment {
    /// Bounds inferred from the data of a single cohort.
    DataBounds,
    /// Every bound was supplied explicitly.
    ExplicitBounds,
    /// Unit square.
    Fixed01,
    /// Union of the per-cohort data ranges.
    UnionOfRanges,
    /// Ranges resolved through a named canonical grid policy.
    CanonicalPolicy(String),
}

impl Alignment {
    /// Alignment of a caller-supplied grid: explicit when every bound is set,
    /// otherwise inferred from the data.
    pub fn for_grid(grid: &GridSpec) -> Self {
        if grid.is_fully_bounded() {
            Self::ExplicitBounds
        } else {
            Self::DataBounds
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataBounds => f.write_str("data-bounds"),
            Self::ExplicitBounds => f.write_str("explicit-bounds"),
            Self::Fixed01 => f.write_str("fixed01"),
            Self::UnionOfRanges => f.write_str("union-of-ranges"),
            Self::CanonicalPolicy(id) => write!(f, "policy:{}", id),
        }
    }
}

/// Self-checks recorded after a density computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NumericChecks {
    /// `sum(pdf) * dx * dy`.
    pub pdf_mass: f64,
    /// Terminal CDF cell.
    pub cdf_terminal: f64,
    /// Sample pairs dropped because a coordinate was NaN or infinite.
    pub dropped_non_finite: usize,
}

impl NumericChecks {
    /// Mass is within `tolerance` of 1 (or exactly 0 for empty input).
    pub fn mass_ok(&self, tolerance: f64) -> bool {
        self.pdf_mass == 0.0 || (self.pdf_mass - 1.0).abs() <= tolerance
    }
}

/// Size and identity of the input data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub dataset_key: String,
    pub n_samples: usize,
    pub dimension: usize,
}

/// Audit record for one computed artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub id: Uuid,
    pub operation: Operation,
    pub surface_kind: SurfaceKind,
    pub x_axis_summary: String,
    pub y_axis_summary: String,
    pub grid_summary: String,
    pub alignment: Alignment,
    pub recipe_name: Option<String>,
    pub data_summary: Option<DataSummary>,
    pub numeric_checks: Option<NumericChecks>,
    pub cohort_labels: Vec<String>,
    pub computed_at: DateTime<Utc>,
    pub compute_millis: Option<u64>,
    /// Id of the record stored with a cached surface this one was served from.
    pub origin: Option<Uuid>,
}

impl Provenance {
    pub fn builder(operation: Operation, surface_kind: SurfaceKind) -> ProvenanceBuilder {
        ProvenanceBuilder::new(operation, surface_kind)
    }

    /// Pretty JSON for the audit layer.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for [`Provenance`]. `build` stamps the id and timestamp.
#[derive(Debug, Clone)]
pub struct ProvenanceBuilder {
    operation: Operation,
    surface_kind: SurfaceKind,
    x_axis_summary: String,
    y_axis_summary: String,
    grid_summary: String,
    alignment: Alignment,
    recipe_name: Option<String>,
    data_summary: Option<DataSummary>,
    numeric_checks: Option<NumericChecks>,
    cohort_labels: Vec<String>,
    compute_millis: Option<u64>,
    origin: Option<Uuid>,
}

impl ProvenanceBuilder {
    pub fn new(operation: Operation, surface_kind: SurfaceKind) -> Self {
        Self {
            operation,
            surface_kind,
            x_axis_summary: String::new(),
            y_axis_summary: String::new(),
            grid_summary: String::new(),
            alignment: Alignment::DataBounds,
            recipe_name: None,
            data_summary: None,
            numeric_checks: None,
            cohort_labels: Vec::new(),
            compute_millis: None,
            origin: None,
        }
    }

    #[must_use]
    pub fn axes(mut self, x: impl fmt::Display, y: impl fmt::Display) -> Self {
        self.x_axis_summary = x.to_string();
        self.y_axis_summary = y.to_string();
        self
    }

    #[must_use]
    pub fn grid(mut self, grid: impl fmt::Display) -> Self {
        self.grid_summary = grid.to_string();
        self
    }

    #[must_use]
    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn recipe_name(mut self, name: Option<&str>) -> Self {
        self.recipe_name = name.map(str::to_string);
        self
    }

    #[must_use]
    pub fn data_summary(mut self, summary: DataSummary) -> Self {
        self.data_summary = Some(summary);
        self
    }

    #[must_use]
    pub fn numeric_checks(mut self, checks: NumericChecks) -> Self {
        self.numeric_checks = Some(checks);
        self
    }

    #[must_use]
    pub fn cohort_label(mut self, label: impl Into<String>) -> Self {
        self.cohort_labels.push(label.into());
        self
    }

    #[must_use]
    pub fn compute_millis(mut self, millis: u64) -> Self {
        self.compute_millis = Some(millis);
        self
    }

    /// Record that the surface was served from a cache entry stored with
    /// `stored`. Its numeric checks carry over; everything else describes
    /// the current request.
    #[must_use]
    pub fn served_from(mut self, stored: &Provenance) -> Self {
        self.numeric_checks = stored.numeric_checks;
        self.origin = Some(stored.id);
        self
    }

    pub fn build(self) -> Provenance {
        Provenance {
            id: Uuid::new_v4(),
            operation: self.operation,
            surface_kind: self.surface_kind,
            x_axis_summary: self.x_axis_summary,
            y_axis_summary: self.y_axis_summary,
            grid_summary: self.grid_summary,
            alignment: self.alignment,
            recipe_name: self.recipe_name,
            data_summary: self.data_summary,
            numeric_checks: self.numeric_checks,
            cohort_labels: self.cohort_labels,
            computed_at: Utc::now(),
            compute_millis: self.compute_millis,
            origin: self.origin,
        }
    }
}

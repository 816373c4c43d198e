//! Core data model: cohorts, axes, grids and density surfaces.

mod axis;
mod cohort;
mod density;
mod grid;

pub use axis::{AxisKey, AxisSpec};
pub use cohort::{Cohort, FeatureVector};
pub use density::{DensityResult, Grid2};
pub use grid::GridSpec;

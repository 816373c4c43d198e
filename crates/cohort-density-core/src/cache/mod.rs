//! Content-addressed cache of computed density surfaces.
//!
//! Entries are keyed by dataset identity (stable id or content fingerprint),
//! both axis keys and the grid encoding. See [`DensityCache`].

mod manager;
mod types;

pub use manager::{CacheMetrics, CacheStats, CachedDensity, DensityCache};
pub use types::{fingerprint, CacheEntry, CacheKey, DatasetKey};

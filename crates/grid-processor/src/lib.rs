//! Grid resampling for map tiles.
//!
//! Turns a slice of a geographic grid into the fixed 256x256 sample grid of a
//! web-map tile. It covers:
//!
//! - **Slice selection**: time and level ordinals, squeeze and the documented
//!   leading-axis fallback
//! - **Axis normalisation**: transposed and descending axes are rearranged so
//!   the interpolator always sees ascending latitude and longitude
//! - **Interpolation**: bilinear or nearest-neighbour on a regular grid,
//!   missing outside the source envelope
//! - **Variable plans**: plain, leveled and vector-magnitude variables
//! - **Statistics**: robust percentile ranges for colour normalisation
//!
//! # Architecture
//!
//! ```text
//! Tile request (variable, level)
//!      │
//!      ▼
//! VariablePlan::resolve(handle)
//!      │
//!      ├─► Plain / Leveled ──► load_field ──► SourceField::sample_tile
//!      │
//!      └─► VectorMagnitude ──► sample east ─┐
//!                              sample north ─┴─► ResampledTile::magnitude
//!               │
//!               ▼
//!          ResampledTile (values + validity mask) to the colorizer
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{Interpolation, VariablePlan};
//! use tile_common::TileCoord;
//!
//! let plan = VariablePlan::resolve("wind10", None, handle.as_ref())?;
//! let range = plan.value_range(handle.as_ref())?;
//! let tile = plan.render(handle.as_ref(), 0, &TileCoord::new(3, 4, 2)?, Interpolation::Linear)?;
//! ```

pub mod error;
pub mod interpolation;
pub mod plan;
pub mod resample;
pub mod stats;

// Re-export commonly used types at crate root
pub use error::{GridProcessorError, Result};
pub use interpolation::{Interpolation, RegularGridInterpolator};
pub use plan::{derived_magnitude, DerivedMagnitude, VariablePlan, DERIVED_MAGNITUDES};
pub use resample::{load_field, sample, select_level_index, ResampledTile, SourceField};
pub use stats::{percentile, robust_range, HIGH_PERCENTILE, LOW_PERCENTILE};

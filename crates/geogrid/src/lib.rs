//! Read access to time-stamped latitude/longitude grid files.
//!
//! A [`GridSource`] opens files into [`GridHandle`]s. Handles expose 1-D
//! coordinate arrays, decoded valid times, per-variable dimension layouts and
//! N-d reads with NaN as the missing-value sentinel. Handles are immutable once
//! opened and safe to share across threads.
//!
//! Backends:
//! - [`MemorySource`]: in-process grids, used by tests and fixtures
//! - `NetcdfSource` (feature `netcdf`): NetCDF-3/4 files through libnetcdf

pub mod array;
pub mod cftime;
pub mod error;
pub mod handle;
pub mod memory;

#[cfg(feature = "netcdf")]
pub mod native;

pub use array::{selected_dims, RawArray, Selector};
pub use error::{GeoGridError, GeoGridResult};
pub use handle::{classify_dimension, DimKind, Dimension, GridHandle, GridSource};
pub use memory::{MemoryGrid, MemorySource};

#[cfg(feature = "netcdf")]
pub use native::{silence_hdf5_errors, NetcdfSource};

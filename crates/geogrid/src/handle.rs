//! Grid source traits and dimension metadata.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{GeoGridResult, RawArray, Selector};

/// Recognised names for coordinate variables, matched case-insensitively.
pub const LATITUDE_NAMES: &[&str] = &["latitude", "lat"];
pub const LONGITUDE_NAMES: &[&str] = &["longitude", "lon"];
pub const TIME_NAMES: &[&str] = &["time", "valid_time"];
pub const LEVEL_NAMES: &[&str] = &["pressure_level", "level", "isobaricinhpa", "plev"];

/// Role of a dimension within a variable's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimKind {
    Time,
    Level,
    Latitude,
    Longitude,
    Other,
}

impl DimKind {
    /// Latitude or longitude.
    pub fn is_horizontal(self) -> bool {
        matches!(self, DimKind::Latitude | DimKind::Longitude)
    }
}

/// Classify a dimension by its name.
pub fn classify_dimension(name: &str) -> DimKind {
    let lower = name.to_ascii_lowercase();
    let is = |names: &[&str]| names.contains(&lower.as_str());
    if is(TIME_NAMES) {
        DimKind::Time
    } else if is(LEVEL_NAMES) {
        DimKind::Level
    } else if is(LATITUDE_NAMES) {
        DimKind::Latitude
    } else if is(LONGITUDE_NAMES) {
        DimKind::Longitude
    } else {
        DimKind::Other
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub kind: DimKind,
}

impl Dimension {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        let name = name.into();
        let kind = classify_dimension(&name);
        Self { name, len, kind }
    }
}

/// An opened grid file.
///
/// Implementations must not mutate after construction; callers may keep using
/// a handle after the cache that produced it has dropped it.
pub trait GridHandle: Send + Sync {
    /// Path the handle was opened from.
    fn path(&self) -> &Path;

    fn variable_names(&self) -> Vec<String>;

    fn has_variable(&self, name: &str) -> bool {
        self.variable_names().iter().any(|v| v == name)
    }

    /// Dimension layout of a data variable, outermost first.
    fn dimensions(&self, variable: &str) -> GeoGridResult<Vec<Dimension>>;

    /// Decoded valid times, in file order. Empty when the file has no time
    /// coordinate.
    fn time_values(&self) -> GeoGridResult<Vec<DateTime<Utc>>>;

    /// Free-form time metadata (for instance a global `time_coverage_start`).
    fn time_attribute(&self) -> Option<String>;

    fn latitudes(&self) -> GeoGridResult<Vec<f64>>;

    fn longitudes(&self) -> GeoGridResult<Vec<f64>>;

    /// Values of the vertical coordinate used by `variable`, or empty when
    /// the variable has no level axis.
    fn level_values(&self, variable: &str) -> GeoGridResult<Vec<f64>>;

    /// Read `variable` with one selector per dimension.
    fn read(&self, variable: &str, selectors: &[Selector]) -> GeoGridResult<RawArray>;
}

/// Opens grid files.
pub trait GridSource: Send + Sync {
    fn open(&self, path: &Path) -> GeoGridResult<Arc<dyn GridHandle>>;
}

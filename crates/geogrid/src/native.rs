//! NetCDF backend using the native netcdf library.
//!
//! Coordinates and time values are read once at open; data variables are
//! read on demand as hyperslabs, one request at a time per file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cftime::decode_times;
use crate::handle::{LATITUDE_NAMES, LONGITUDE_NAMES, TIME_NAMES};
use crate::{
    selected_dims, DimKind, Dimension, GeoGridError, GeoGridResult, GridHandle, GridSource,
    RawArray, Selector,
};

/// Global attributes consulted for a raw time string.
const TIME_ATTRIBUTES: &[&str] = &["time_coverage_start", "valid_time", "date", "time"];

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints diagnostics even when the Rust side handles the
/// error, for instance when probing optional attributes. Safe to call more
/// than once; only the first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable automatic printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Opens NetCDF files from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfSource;

impl NetcdfSource {
    pub fn new() -> Self {
        silence_hdf5_errors();
        Self
    }
}

impl GridSource for NetcdfSource {
    fn open(&self, path: &Path) -> GeoGridResult<Arc<dyn GridHandle>> {
        Ok(Arc::new(NetcdfGrid::open(path)?))
    }
}

/// An open NetCDF file with its coordinate axes.
pub struct NetcdfGrid {
    path: PathBuf,
    file: Mutex<netcdf::File>,
    variables: HashMap<String, Vec<Dimension>>,
    variable_order: Vec<String>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    time_attribute: Option<String>,
}

impl NetcdfGrid {
    pub fn open(path: &Path) -> GeoGridResult<Self> {
        let file = netcdf::open(path).map_err(|e| GeoGridError::open(path.display(), e.to_string()))?;

        let mut variables = HashMap::new();
        let mut variable_order = Vec::new();
        for var in file.variables() {
            let dims: Vec<Dimension> = var
                .dimensions()
                .iter()
                .map(|d| Dimension::new(d.name(), d.len()))
                .collect();
            let spatial = dims.iter().any(|d| d.kind == DimKind::Latitude)
                && dims.iter().any(|d| d.kind == DimKind::Longitude);
            if spatial {
                variable_order.push(var.name());
                variables.insert(var.name(), dims);
            }
        }

        let lats = read_coordinate(&file, LATITUDE_NAMES)?
            .ok_or_else(|| GeoGridError::MissingData("latitude coordinate".to_string()))?;
        let lons = read_coordinate(&file, LONGITUDE_NAMES)?
            .ok_or_else(|| GeoGridError::MissingData("longitude coordinate".to_string()))?;
        let times = read_times(&file)?;
        let time_attribute = TIME_ATTRIBUTES
            .iter()
            .find_map(|name| global_str_attr(&file, name));

        debug!(
            path = %path.display(),
            variables = variable_order.len(),
            times = times.len(),
            "Opened NetCDF grid"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            variables,
            variable_order,
            lats,
            lons,
            times,
            time_attribute,
        })
    }

    fn dims_of(&self, variable: &str) -> GeoGridResult<&Vec<Dimension>> {
        self.variables
            .get(variable)
            .ok_or_else(|| GeoGridError::VariableNotFound(variable.to_string()))
    }
}

impl GridHandle for NetcdfGrid {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> Vec<String> {
        self.variable_order.clone()
    }

    fn dimensions(&self, variable: &str) -> GeoGridResult<Vec<Dimension>> {
        Ok(self.dims_of(variable)?.clone())
    }

    fn time_values(&self) -> GeoGridResult<Vec<DateTime<Utc>>> {
        Ok(self.times.clone())
    }

    fn time_attribute(&self) -> Option<String> {
        self.time_attribute.clone()
    }

    fn latitudes(&self) -> GeoGridResult<Vec<f64>> {
        Ok(self.lats.clone())
    }

    fn longitudes(&self) -> GeoGridResult<Vec<f64>> {
        Ok(self.lons.clone())
    }

    fn level_values(&self, variable: &str) -> GeoGridResult<Vec<f64>> {
        let Some(level_dim) = self
            .dims_of(variable)?
            .iter()
            .find(|d| d.kind == DimKind::Level)
            .cloned()
        else {
            return Ok(Vec::new());
        };

        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        match read_coordinate(&file, &[level_dim.name.as_str()])? {
            Some(values) => Ok(values),
            None => Ok((0..level_dim.len).map(|i| i as f64).collect()),
        }
    }

    fn read(&self, variable: &str, selectors: &[Selector]) -> GeoGridResult<RawArray> {
        let dims = self.dims_of(variable)?;
        let kept = selected_dims(dims, selectors)?;

        let (raw, packing) = {
            let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
            let var = file
                .variable(variable)
                .ok_or_else(|| GeoGridError::VariableNotFound(variable.to_string()))?;

            // Only the selected hyperslab is read from disk
            let raw: Vec<f32> = var.get_values(hyperslab(selectors)).map_err(|e| {
                GeoGridError::InvalidFormat(format!("Failed to read {}: {}", variable, e))
            })?;
            (raw, Packing::of(&var))
        };

        debug!(variable, values = raw.len(), "Read hyperslab");
        RawArray::new(kept, packing.unpack(raw))
    }
}

/// NetCDF extents for a selection: one index per `Index`, the full axis per `All`.
fn hyperslab(selectors: &[Selector]) -> Vec<netcdf::Extent> {
    selectors
        .iter()
        .map(|sel| match *sel {
            Selector::Index(i) => (i..i + 1).into(),
            Selector::All => (..).into(),
        })
        .collect()
}

/// CF packing attributes of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    scale: f64,
    offset: f64,
    fill: Option<f64>,
    missing: Option<f64>,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            fill: None,
            missing: None,
        }
    }
}

impl Packing {
    fn of(var: &netcdf::Variable) -> Self {
        Self {
            scale: get_f64_attr(var, "scale_factor").unwrap_or(1.0),
            offset: get_f64_attr(var, "add_offset").unwrap_or(0.0),
            fill: get_f64_attr(var, "_FillValue"),
            missing: get_f64_attr(var, "missing_value"),
        }
    }

    /// Apply scale/offset; fill, missing and non-finite values become NaN.
    fn unpack(&self, raw: Vec<f32>) -> Vec<f32> {
        let matches = |sentinel: Option<f64>, v: f64| sentinel.map_or(false, |s| v == s as f32 as f64);
        raw.into_iter()
            .map(|v| {
                let value = v as f64;
                if !v.is_finite() || matches(self.fill, value) || matches(self.missing, value) {
                    f32::NAN
                } else {
                    (value * self.scale + self.offset) as f32
                }
            })
            .collect()
    }
}

fn read_coordinate(file: &netcdf::File, names: &[&str]) -> GeoGridResult<Option<Vec<f64>>> {
    let Some(var) = file
        .variables()
        .find(|v| names.iter().any(|n| v.name().eq_ignore_ascii_case(n)))
    else {
        return Ok(None);
    };
    let values: Vec<f64> = var
        .get_values(..)
        .map_err(|e| GeoGridError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e)))?;
    Ok(Some(values))
}

fn read_times(file: &netcdf::File) -> GeoGridResult<Vec<DateTime<Utc>>> {
    let Some(var) = file
        .variables()
        .find(|v| TIME_NAMES.iter().any(|n| v.name().eq_ignore_ascii_case(n)))
    else {
        return Ok(Vec::new());
    };
    let Some(units) = get_str_attr(&var, "units") else {
        return Err(GeoGridError::MissingData(format!("units on {}", var.name())));
    };
    let values: Vec<f64> = var
        .get_values(..)
        .map_err(|e| GeoGridError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e)))?;
    decode_times(&values, &units)
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn global_str_attr(file: &netcdf::File, name: &str) -> Option<String> {
    if !file.attributes().any(|a| a.name() == name) {
        return None;
    }
    match file.attribute(name)?.value().ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

//! In-process grid backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::{
    DimKind, Dimension, GeoGridError, GeoGridResult, GridHandle, GridSource, RawArray, Selector,
};

/// A fully materialised grid with shared coordinate axes.
#[derive(Debug, Clone)]
pub struct MemoryGrid {
    path: PathBuf,
    lats: Vec<f64>,
    lons: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    levels: Vec<f64>,
    time_attribute: Option<String>,
    variables: Vec<(String, RawArray)>,
}

impl MemoryGrid {
    pub fn new(lats: Vec<f64>, lons: Vec<f64>) -> Self {
        Self {
            path: PathBuf::new(),
            lats,
            lons,
            times: Vec::new(),
            levels: Vec::new(),
            time_attribute: None,
            variables: Vec::new(),
        }
    }

    pub fn with_times(mut self, times: Vec<DateTime<Utc>>) -> Self {
        self.times = times;
        self
    }

    pub fn with_levels(mut self, levels: Vec<f64>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_time_attribute(mut self, value: impl Into<String>) -> Self {
        self.time_attribute = Some(value.into());
        self
    }

    /// Add a variable laid out over the grid's own axes.
    ///
    /// Axis lengths come from the grid: `Time` uses the time list, `Level` the
    /// level list, and so on. `Other` is not allowed here; use
    /// [`MemoryGrid::with_variable_dims`] for custom dimensions.
    pub fn with_variable(
        self,
        name: impl Into<String>,
        layout: &[DimKind],
        data: Vec<f32>,
    ) -> GeoGridResult<Self> {
        let mut dims = Vec::with_capacity(layout.len());
        for kind in layout {
            let dim = match kind {
                DimKind::Time => Dimension::new("time", self.times.len()),
                DimKind::Level => Dimension::new("pressure_level", self.levels.len()),
                DimKind::Latitude => Dimension::new("latitude", self.lats.len()),
                DimKind::Longitude => Dimension::new("longitude", self.lons.len()),
                DimKind::Other => {
                    return Err(GeoGridError::InvalidFormat(
                        "custom dimensions need with_variable_dims".to_string(),
                    ))
                }
            };
            dims.push(dim);
        }
        self.with_variable_dims(name, dims, data)
    }

    /// Add a variable with an explicit dimension list.
    pub fn with_variable_dims(
        mut self,
        name: impl Into<String>,
        dims: Vec<Dimension>,
        data: Vec<f32>,
    ) -> GeoGridResult<Self> {
        let name = name.into();
        let array = RawArray::new(dims, data)?;
        self.variables.retain(|(existing, _)| existing != &name);
        self.variables.push((name, array));
        Ok(self)
    }

    fn variable(&self, name: &str) -> GeoGridResult<&RawArray> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| GeoGridError::VariableNotFound(name.to_string()))
    }
}

impl GridHandle for MemoryGrid {
    fn path(&self) -> &Path {
        &self.path
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(n, _)| n.clone()).collect()
    }

    fn dimensions(&self, variable: &str) -> GeoGridResult<Vec<Dimension>> {
        Ok(self.variable(variable)?.dims.clone())
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
        let has_level = self
            .variable(variable)?
            .dims
            .iter()
            .any(|d| d.kind == DimKind::Level);
        Ok(if has_level {
            self.levels.clone()
        } else {
            Vec::new()
        })
    }

    fn read(&self, variable: &str, selectors: &[Selector]) -> GeoGridResult<RawArray> {
        self.variable(variable)?.select(selectors)
    }
}

/// Registry of in-memory grids keyed by path, counting opens.
#[derive(Default)]
pub struct MemorySource {
    grids: RwLock<HashMap<PathBuf, MemoryGrid>>,
    opens: AtomicU64,
    opens_by_path: RwLock<HashMap<PathBuf, u64>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the grid served for `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, grid: MemoryGrid) {
        let path = path.into();
        let grid = MemoryGrid {
            path: path.clone(),
            ..grid
        };
        self.grids
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, grid);
    }

    pub fn remove(&self, path: &Path) {
        self.grids
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
    }

    /// Total successful opens.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Successful opens of one path.
    pub fn open_count_for(&self, path: &Path) -> u64 {
        self.opens_by_path
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl GridSource for MemorySource {
    fn open(&self, path: &Path) -> GeoGridResult<Arc<dyn GridHandle>> {
        let grid = self
            .grids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| GeoGridError::open(path.display(), "no grid registered"))?;

        self.opens.fetch_add(1, Ordering::Relaxed);
        *self
            .opens_by_path
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        Ok(Arc::new(grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grid() -> MemoryGrid {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MemoryGrid::new(vec![10.0, 20.0], vec![0.0, 1.0, 2.0])
            .with_times(vec![t0])
            .with_levels(vec![500.0, 850.0])
            .with_variable(
                "z",
                &[DimKind::Time, DimKind::Level, DimKind::Latitude, DimKind::Longitude],
                (0..12).map(|v| v as f32).collect(),
            )
            .unwrap()
            .with_variable(
                "u10",
                &[DimKind::Latitude, DimKind::Longitude],
                vec![1.0; 6],
            )
            .unwrap()
    }

    #[test]
    fn test_level_values_only_for_leveled_variables() {
        let g = grid();
        assert_eq!(g.level_values("z").unwrap(), vec![500.0, 850.0]);
        assert!(g.level_values("u10").unwrap().is_empty());
        assert!(matches!(
            g.level_values("t2m"),
            Err(GeoGridError::VariableNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_data_length_rejected() {
        let res = MemoryGrid::new(vec![0.0], vec![0.0, 1.0]).with_variable(
            "x",
            &[DimKind::Latitude, DimKind::Longitude],
            vec![1.0],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_source_counts_opens() {
        let source = MemorySource::new();
        let path = PathBuf::from("/data/era5_20240101.nc");
        source.insert(path.clone(), grid());

        let handle = source.open(&path).unwrap();
        assert_eq!(handle.path(), path.as_path());
        source.open(&path).unwrap();

        assert_eq!(source.open_count(), 2);
        assert_eq!(source.open_count_for(&path), 2);
        assert!(source.open(Path::new("/data/missing.nc")).is_err());
        assert_eq!(source.open_count(), 2);
    }

    #[test]
    fn test_read_level_slice() {
        let slice = grid()
            .read(
                "z",
                &[Selector::Index(0), Selector::Index(1), Selector::All, Selector::All],
            )
            .unwrap();
        assert_eq!(slice.data, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }
}

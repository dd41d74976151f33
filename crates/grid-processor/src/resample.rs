//! Projection of source grids onto the fixed 256x256 tile sample grid.
//!
//! A source slice goes through the same steps every time:
//! 1. select by time and level ordinal, then squeeze to two dimensions
//! 2. arrange as (latitude, longitude), both axes ascending
//! 3. evaluate the regular-grid interpolator at each tile sample point

use rayon::prelude::*;
use tracing::warn;

use geogrid::{DimKind, GridHandle, RawArray, Selector};
use tile_common::{TileCoord, TileGrid};

use crate::error::{GridProcessorError, Result};
use crate::interpolation::{Interpolation, RegularGridInterpolator};

/// Index of `requested` on a level axis: an exact match if present,
/// otherwise the closest value (first one on equal distance).
pub fn select_level_index(levels: &[f64], requested: f64) -> Option<usize> {
    if let Some(exact) = levels.iter().position(|&l| l == requested) {
        return Some(exact);
    }
    levels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &l)| {
            let d = (l - requested).abs();
            match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((i, d)),
            }
        })
        .map(|(i, _)| i)
}

/// A 2-D source field with ascending latitude and longitude axes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceField {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// Lat-major values, NaN where missing.
    pub values: Vec<f32>,
}

impl SourceField {
    /// Build a field from raw axes and a lat-major value array, reversing
    /// descending axes.
    pub fn new(mut lats: Vec<f64>, mut lons: Vec<f64>, mut values: Vec<f32>) -> Result<Self> {
        let (rows, cols) = (lats.len(), lons.len());
        if rows == 0 || cols == 0 || rows * cols != values.len() {
            return Err(GridProcessorError::invalid_shape(format!(
                "{} values for {} latitudes x {} longitudes",
                values.len(),
                rows,
                cols
            )));
        }

        if is_descending(&lats) {
            lats.reverse();
            let mut flipped = Vec::with_capacity(values.len());
            for row in values.chunks_exact(cols).rev() {
                flipped.extend_from_slice(row);
            }
            values = flipped;
        }
        if is_descending(&lons) {
            lons.reverse();
            for row in values.chunks_exact_mut(cols) {
                row.reverse();
            }
        }

        Ok(Self { lats, lons, values })
    }

    /// Whether longitudes use the 0..360 convention.
    pub fn uses_360(&self) -> bool {
        self.lons.last().map_or(false, |&l| l > 180.0)
    }

    /// Interpolate the field at every sample point of `grid`.
    pub fn sample_tile(&self, grid: &TileGrid, method: Interpolation) -> ResampledTile {
        let interp = RegularGridInterpolator::new(&self.lats, &self.lons, &self.values, method);
        let uses_360 = self.uses_360();
        let width = grid.width();

        let values: Vec<f32> = grid
            .lats
            .par_iter()
            .flat_map_iter(|&lat| {
                let interp = &interp;
                grid.lons.iter().map(move |&lon| {
                    let lon = if uses_360 && lon < 0.0 { lon + 360.0 } else { lon };
                    interp.sample(lat, lon)
                })
            })
            .collect();

        ResampledTile::from_values(width, grid.height(), values)
    }
}

fn is_descending(axis: &[f64]) -> bool {
    axis.len() > 1 && axis[0] > axis[axis.len() - 1]
}

/// Interpolated tile values and their validity mask, row 0 at the north edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledTile {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub valid: Vec<bool>,
}

impl ResampledTile {
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        let valid = values.iter().map(|v| v.is_finite()).collect();
        Self {
            width,
            height,
            values,
            valid,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    pub fn all_invalid(&self) -> bool {
        !self.valid.iter().any(|v| *v)
    }

    /// Per-pixel Euclidean norm of two component tiles. A pixel is valid only
    /// where both components are.
    pub fn magnitude(&self, other: &ResampledTile) -> Result<ResampledTile> {
        if self.width != other.width || self.height != other.height {
            return Err(GridProcessorError::invalid_shape(format!(
                "component tiles differ: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        let mut values = Vec::with_capacity(self.values.len());
        let mut valid = Vec::with_capacity(self.values.len());
        for i in 0..self.values.len() {
            let ok = self.valid[i] && other.valid[i];
            valid.push(ok);
            values.push(if ok {
                self.values[i].hypot(other.values[i])
            } else {
                f32::NAN
            });
        }
        Ok(ResampledTile {
            width: self.width,
            height: self.height,
            values,
            valid,
        })
    }
}

/// Read one 2-D slice of `variable` as an ascending [`SourceField`].
///
/// The time axis is selected by `time_ordinal`, the level axis by
/// `level_ordinal` when given. Whatever remains is squeezed, keeping
/// latitude and longitude even at length one; if more than two axes survive,
/// the first slice along the leading non-horizontal axis is taken until two
/// remain.
pub fn load_field(
    handle: &dyn GridHandle,
    variable: &str,
    time_ordinal: usize,
    level_ordinal: Option<usize>,
) -> Result<SourceField> {
    let dims = handle.dimensions(variable)?;
    let mut selectors = Vec::with_capacity(dims.len());
    for dim in &dims {
        let selector = match dim.kind {
            DimKind::Time => {
                if time_ordinal >= dim.len {
                    return Err(GridProcessorError::out_of_range(format!(
                        "time ordinal {} on '{}' of length {}",
                        time_ordinal, dim.name, dim.len
                    )));
                }
                Selector::Index(time_ordinal)
            }
            DimKind::Level => match level_ordinal {
                Some(i) if i < dim.len => Selector::Index(i),
                Some(i) => {
                    return Err(GridProcessorError::out_of_range(format!(
                        "level ordinal {} on '{}' of length {}",
                        i, dim.name, dim.len
                    )))
                }
                None => Selector::All,
            },
            _ => Selector::All,
        };
        selectors.push(selector);
    }

    let mut slice = handle.read(variable, &selectors)?.squeeze();
    while slice.ndim() > 2 {
        let axis = slice
            .dims
            .iter()
            .position(|d| !d.kind.is_horizontal())
            .unwrap_or(0);
        warn!(
            variable = %variable,
            dropped_axis = %slice.dims[axis].name,
            axis_len = slice.dims[axis].len,
            "Slice still has more than two axes; taking the first element of the leading axis"
        );
        let mut first = vec![Selector::All; slice.ndim()];
        first[axis] = Selector::Index(0);
        slice = slice.select(&first)?;
    }

    let lats = handle.latitudes()?;
    let lons = handle.longitudes()?;
    let values = orient_lat_lon(slice, lats.len(), lons.len())?;
    SourceField::new(lats, lons, values)
}

/// Arrange a 2-D slice as (latitude, longitude), transposing when needed.
fn orient_lat_lon(slice: RawArray, n_lat: usize, n_lon: usize) -> Result<Vec<f32>> {
    let shape = slice.shape();
    let kinds = slice.kinds();

    let transposed = match (shape.as_slice(), kinds.as_slice()) {
        ([_, _], [DimKind::Longitude, DimKind::Latitude]) => true,
        ([_, _], [DimKind::Latitude, DimKind::Longitude]) => false,
        ([a, b], _) if *a == n_lat && *b == n_lon => false,
        ([a, b], _) if *a == n_lon && *b == n_lat => true,
        _ => {
            return Err(GridProcessorError::invalid_shape(format!(
                "slice of shape {:?} does not match {} latitudes x {} longitudes",
                shape, n_lat, n_lon
            )))
        }
    };

    if !transposed {
        return Ok(slice.data);
    }

    // Source is (lon, lat); emit (lat, lon)
    let (rows, cols) = (shape[0], shape[1]);
    let mut out = vec![f32::NAN; slice.data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = slice.data[r * cols + c];
        }
    }
    Ok(out)
}

/// Resample `variable` onto the sample grid of tile `coord`.
pub fn sample(
    handle: &dyn GridHandle,
    variable: &str,
    time_ordinal: usize,
    level_ordinal: Option<usize>,
    coord: &TileCoord,
    method: Interpolation,
) -> Result<ResampledTile> {
    let field = load_field(handle, variable, time_ordinal, level_ordinal)?;
    Ok(field.sample_tile(&TileGrid::for_tile(coord), method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geogrid::{Dimension, MemoryGrid};

    #[test]
    fn test_select_level_index() {
        let levels = [1000.0, 850.0, 500.0, 250.0];
        assert_eq!(select_level_index(&levels, 500.0), Some(2));
        assert_eq!(select_level_index(&levels, 300.0), Some(3));
        assert_eq!(select_level_index(&levels, 900.0), Some(1));
        // 675 is equidistant from 850 and 500; first wins
        assert_eq!(select_level_index(&levels, 675.0), Some(1));
        assert_eq!(select_level_index(&[], 500.0), None);
    }

    #[test]
    fn test_exact_level_beats_closer_float_noise() {
        let levels = [500.0, 500.0001, 250.0];
        assert_eq!(select_level_index(&levels, 500.0001), Some(1));
    }

    #[test]
    fn test_source_field_normalises_descending_axes() {
        // lat descending [1, 0], lon descending [11, 10]
        let field = SourceField::new(
            vec![1.0, 0.0],
            vec![11.0, 10.0],
            vec![
                4.0, 3.0, //
                2.0, 1.0,
            ],
        )
        .unwrap();
        assert_eq!(field.lats, vec![0.0, 1.0]);
        assert_eq!(field.lons, vec![10.0, 11.0]);
        assert_eq!(field.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_source_field_shape_mismatch() {
        assert!(SourceField::new(vec![0.0, 1.0], vec![0.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_magnitude_masks() {
        let u = ResampledTile::from_values(2, 1, vec![3.0, f32::NAN]);
        let v = ResampledTile::from_values(2, 1, vec![4.0, 1.0]);
        let m = u.magnitude(&v).unwrap();
        assert_eq!(m.values[0], 5.0);
        assert_eq!(m.valid, vec![true, false]);
    }

    #[test]
    fn test_load_field_transposes_lon_lat() {
        let grid = MemoryGrid::new(vec![0.0, 1.0], vec![10.0, 11.0, 12.0])
            .with_variable(
                "t",
                &[DimKind::Longitude, DimKind::Latitude],
                // (lon, lat) order
                vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0],
            )
            .unwrap();
        let field = load_field(&grid, "t", 0, None).unwrap();
        assert_eq!(field.values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_load_field_leading_axis_fallback() {
        // Extra ensemble axis of length 2 survives squeeze
        let grid = MemoryGrid::new(vec![0.0, 1.0], vec![0.0, 1.0])
            .with_variable_dims(
                "z",
                vec![
                    Dimension::new("number", 2),
                    Dimension::new("latitude", 2),
                    Dimension::new("longitude", 2),
                ],
                vec![1.0, 2.0, 3.0, 4.0, 9.0, 9.0, 9.0, 9.0],
            )
            .unwrap();
        let field = load_field(&grid, "z", 0, None).unwrap();
        assert_eq!(field.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_load_field_single_row_grid() {
        let grid = MemoryGrid::new(vec![5.0], vec![0.0, 1.0, 2.0])
            .with_times(vec![test_utils::jan1(0)])
            .with_variable(
                "z",
                &[DimKind::Time, DimKind::Latitude, DimKind::Longitude],
                vec![2.0, 4.0, 6.0],
            )
            .unwrap();
        let field = load_field(&grid, "z", 0, None).unwrap();
        assert_eq!(field.lats, vec![5.0]);
        assert_eq!(field.lons, vec![0.0, 1.0, 2.0]);
        assert_eq!(field.values, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_load_field_single_column_with_ensemble() {
        // Length-1 longitude must not be mistaken for the extra axis
        let grid = MemoryGrid::new(vec![0.0, 1.0], vec![3.0])
            .with_variable_dims(
                "z",
                vec![
                    Dimension::new("number", 2),
                    Dimension::new("latitude", 2),
                    Dimension::new("longitude", 1),
                ],
                vec![1.0, 2.0, 9.0, 9.0],
            )
            .unwrap();
        let field = load_field(&grid, "z", 0, None).unwrap();
        assert_eq!(field.values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_load_field_time_out_of_range() {
        let grid = MemoryGrid::new(vec![0.0, 1.0], vec![0.0, 1.0])
            .with_times(vec![test_utils::jan1(0)])
            .with_variable(
                "z",
                &[DimKind::Time, DimKind::Latitude, DimKind::Longitude],
                vec![0.0; 4],
            )
            .unwrap();
        assert!(matches!(
            load_field(&grid, "z", 1, None),
            Err(GridProcessorError::OutOfRange(_))
        ));
        assert!(matches!(
            load_field(&grid, "q", 0, None),
            Err(GridProcessorError::Source(_))
        ));
    }
}

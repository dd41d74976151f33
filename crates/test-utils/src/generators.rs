//! Synthetic grids with predictable values.

use chrono::{DateTime, TimeZone, Utc};
use geogrid::{DimKind, MemoryGrid};

/// `n` evenly spaced coordinate values from `start` to `end` inclusive.
pub fn axis(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Row-major field where each value is `f(lat, lon)`.
pub fn field<F>(lats: &[f64], lons: &[f64], f: F) -> Vec<f32>
where
    F: Fn(f64, f64) -> f64,
{
    let mut data = Vec::with_capacity(lats.len() * lons.len());
    for &lat in lats {
        for &lon in lons {
            data.push(f(lat, lon) as f32);
        }
    }
    data
}

/// 2024-01-01 at `hour`:00 UTC.
pub fn jan1(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Global 2-D grid (1° spacing, ascending axes) with one variable
/// `name = lat + lon`.
pub fn global_planar_grid(name: &str) -> MemoryGrid {
    let lats = axis(-90.0, 90.0, 181);
    let lons = axis(-180.0, 180.0, 361);
    let data = field(&lats, &lons, |lat, lon| lat + lon);
    MemoryGrid::new(lats, lons)
        .with_variable(name, &[DimKind::Latitude, DimKind::Longitude], data)
        .unwrap_or_else(|e| panic!("bad synthetic grid: {}", e))
}

/// [`global_planar_grid`] with both axes (and the data) stored descending.
pub fn reversed_planar_grid(name: &str) -> MemoryGrid {
    let lats = axis(90.0, -90.0, 181);
    let lons = axis(180.0, -180.0, 361);
    let data = field(&lats, &lons, |lat, lon| lat + lon);
    MemoryGrid::new(lats, lons)
        .with_variable(name, &[DimKind::Latitude, DimKind::Longitude], data)
        .unwrap_or_else(|e| panic!("bad synthetic grid: {}", e))
}

/// Regional grid over `[west, east] x [south, north]` holding a constant
/// field per variable, with a time axis of the given steps.
pub fn uniform_timed_grid(
    bounds: (f64, f64, f64, f64),
    times: Vec<DateTime<Utc>>,
    variables: &[(&str, f32)],
) -> MemoryGrid {
    let (west, south, east, north) = bounds;
    let lats = axis(south, north, 21);
    let lons = axis(west, east, 21);
    let cells = lats.len() * lons.len() * times.len();
    let mut grid = MemoryGrid::new(lats, lons).with_times(times);
    for (name, value) in variables {
        grid = grid
            .with_variable(
                *name,
                &[DimKind::Time, DimKind::Latitude, DimKind::Longitude],
                vec![*value; cells],
            )
            .unwrap_or_else(|e| panic!("bad synthetic grid: {}", e));
    }
    grid
}

/// Global pressure-level grid shaped like ERA5 output: latitudes descending
/// from 90, longitudes 0..359, variable `z` of shape (time, level, lat, lon)
/// whose value is `level * 10 + time_index`.
pub fn era5_pressure_grid(times: Vec<DateTime<Utc>>, levels: Vec<f64>) -> MemoryGrid {
    let lats = axis(90.0, -90.0, 91);
    let lons = axis(0.0, 358.0, 180);
    let plane = lats.len() * lons.len();
    let mut data = Vec::with_capacity(times.len() * levels.len() * plane);
    for t in 0..times.len() {
        for level in &levels {
            data.extend(std::iter::repeat((level * 10.0) as f32 + t as f32).take(plane));
        }
    }
    MemoryGrid::new(lats, lons)
        .with_times(times)
        .with_levels(levels)
        .with_variable(
            "z",
            &[DimKind::Time, DimKind::Level, DimKind::Latitude, DimKind::Longitude],
            data,
        )
        .unwrap_or_else(|e| panic!("bad synthetic grid: {}", e))
}

//! XYZ (slippy map) tile addressing and the per-tile sample grid.

use crate::{BoundingBox, TileError, TileResult};
use serde::{Deserialize, Serialize};

/// Edge length in pixels of every rendered tile.
pub const TILE_SIZE: usize = 256;

/// Deepest zoom accepted from callers.
pub const MAX_ZOOM: u32 = 24;

/// A tile coordinate (z/x/y), row 0 at the north edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Build a coordinate, rejecting zooms past `MAX_ZOOM` and columns or rows
    /// outside the `2^z` matrix.
    pub fn new(z: u32, x: u32, y: u32) -> TileResult<Self> {
        if z > MAX_ZOOM {
            return Err(TileError::InvalidRequest(format!(
                "zoom {} exceeds maximum {}",
                z, MAX_ZOOM
            )));
        }
        let n = 1u64 << z;
        if x as u64 >= n || y as u64 >= n {
            return Err(TileError::InvalidRequest(format!(
                "tile {}/{}/{} outside the {}x{} matrix",
                z, x, y, n, n
            )));
        }
        Ok(Self { z, x, y })
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Geographic bounds of the tile in the Web Mercator tiling scheme.
    pub fn bounds(&self) -> BoundingBox {
        let n = (1u64 << self.z) as f64;

        let west = self.x as f64 / n * 360.0 - 180.0;
        let east = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let north = mercator_row_to_lat(self.y as f64, n);
        let south = mercator_row_to_lat((self.y + 1) as f64, n);

        BoundingBox::new(west, south, east, north)
    }
}

fn mercator_row_to_lat(row: f64, n: f64) -> f64 {
    (std::f64::consts::PI * (1.0 - 2.0 * row / n))
        .sinh()
        .atan()
        .to_degrees()
}

/// Destination sample points for one tile.
///
/// Longitudes run west to east across columns. Latitudes run north to south
/// down rows, so row 0 is the image's top edge. Both include the tile edges.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub bounds: BoundingBox,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
}

impl TileGrid {
    pub fn for_tile(coord: &TileCoord) -> Self {
        let bounds = coord.bounds();
        Self {
            bounds,
            lons: linspace(bounds.west, bounds.east, TILE_SIZE),
            lats: linspace(bounds.north, bounds.south, TILE_SIZE),
        }
    }

    pub fn width(&self) -> usize {
        self.lons.len()
    }

    pub fn height(&self) -> usize {
        self.lats.len()
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

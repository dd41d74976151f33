//! Interpolation on rectilinear grids with ascending coordinate axes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Interpolation method for grid resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Linear,
    Nearest,
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "bilinear" => Ok(Interpolation::Linear),
            "nearest" => Ok(Interpolation::Nearest),
            other => Err(format!("unknown interpolation '{}'", other)),
        }
    }
}

/// Position of `x` on an ascending axis: the lower bracketing index and the
/// fractional offset towards the next one. `None` outside `[first, last]`.
fn locate(axis: &[f64], x: f64) -> Option<(usize, f64)> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    if !(x >= first && x <= last) {
        return None;
    }
    if axis.len() == 1 {
        return Some((0, 0.0));
    }

    // First index whose value is > x, minus one, kept inside [0, len - 2]
    let upper = axis.partition_point(|&v| v <= x);
    let i = upper.saturating_sub(1).min(axis.len() - 2);
    let span = axis[i + 1] - axis[i];
    let frac = if span > 0.0 { (x - axis[i]) / span } else { 0.0 };
    Some((i, frac))
}

/// Regular-grid interpolator over a lat-major field.
///
/// Both axes must be ascending. Points outside the coordinate envelope
/// evaluate to NaN.
pub struct RegularGridInterpolator<'a> {
    lats: &'a [f64],
    lons: &'a [f64],
    values: &'a [f32],
    method: Interpolation,
}

impl<'a> RegularGridInterpolator<'a> {
    pub fn new(lats: &'a [f64], lons: &'a [f64], values: &'a [f32], method: Interpolation) -> Self {
        debug_assert_eq!(lats.len() * lons.len(), values.len());
        Self {
            lats,
            lons,
            values,
            method,
        }
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.lons.len() + col]
    }

    pub fn sample(&self, lat: f64, lon: f64) -> f32 {
        let (Some((row, fy)), Some((col, fx))) = (locate(self.lats, lat), locate(self.lons, lon))
        else {
            return f32::NAN;
        };

        match self.method {
            Interpolation::Nearest => {
                // Exact midpoints go to the lower index
                let r = if fy > 0.5 { row + 1 } else { row };
                let c = if fx > 0.5 { col + 1 } else { col };
                self.at(r, c)
            }
            Interpolation::Linear => self.bilinear(row, col, fy, fx),
        }
    }

    fn bilinear(&self, row: usize, col: usize, fy: f64, fx: f64) -> f32 {
        let row1 = (row + 1).min(self.lats.len() - 1);
        let col1 = (col + 1).min(self.lons.len() - 1);
        let corners = [
            (row, col, (1.0 - fy) * (1.0 - fx)),
            (row, col1, (1.0 - fy) * fx),
            (row1, col, fy * (1.0 - fx)),
            (row1, col1, fy * fx),
        ];

        let mut acc = 0.0f64;
        for (r, c, w) in corners {
            if w == 0.0 {
                continue;
            }
            let v = self.at(r, c);
            // Any contributing missing corner makes the point missing
            if v.is_nan() {
                return f32::NAN;
            }
            acc += v as f64 * w;
        }
        acc as f32
    }
}

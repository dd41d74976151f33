//! Per-request variable plans.
//!
//! A requested variable name is resolved once against the opened grid into a
//! closed set of plans. Derived variables come from a static table rather than
//! name checks scattered through the rendering path.

use std::fmt;

use tracing::debug;

use geogrid::GridHandle;
use tile_common::{TileCoord, ValueRange};

use crate::error::{GridProcessorError, Result};
use crate::interpolation::Interpolation;
use crate::resample::{self, select_level_index, ResampledTile};
use crate::stats::robust_range;

/// A variable computed as the Euclidean norm of two component fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedMagnitude {
    pub name: &'static str,
    pub east: &'static str,
    pub north: &'static str,
}

/// Vector-magnitude variables that can be derived from their components.
pub const DERIVED_MAGNITUDES: &[DerivedMagnitude] = &[
    DerivedMagnitude {
        name: "wind10",
        east: "u10",
        north: "v10",
    },
    DerivedMagnitude {
        name: "wind100",
        east: "u100",
        north: "v100",
    },
    DerivedMagnitude {
        name: "wind",
        east: "u",
        north: "v",
    },
];

/// Look up a derived magnitude by name (case-insensitive).
pub fn derived_magnitude(name: &str) -> Option<&'static DerivedMagnitude> {
    DERIVED_MAGNITUDES
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
}

/// How a requested variable is read from a grid.
#[derive(Debug, Clone, PartialEq)]
pub enum VariablePlan {
    /// A variable stored in the file, read at the time ordinal only.
    Plain(String),
    /// A variable with a vertical axis, sliced at the level nearest `level`.
    Leveled { name: String, level: f64 },
    /// The norm of two stored components, optionally at a level.
    VectorMagnitude {
        east: String,
        north: String,
        level: Option<f64>,
    },
}

impl VariablePlan {
    /// Resolve `requested` against the variables and levels of `handle`.
    ///
    /// Stored variables win over derived names. A requested level only
    /// matters for variables that actually have a level axis.
    pub fn resolve(requested: &str, level: Option<f64>, handle: &dyn GridHandle) -> Result<Self> {
        if handle.has_variable(requested) {
            let leveled = match level {
                Some(_) => !handle.level_values(requested)?.is_empty(),
                None => false,
            };
            return Ok(match (leveled, level) {
                (true, Some(level)) => VariablePlan::Leveled {
                    name: requested.to_string(),
                    level,
                },
                _ => VariablePlan::Plain(requested.to_string()),
            });
        }

        if let Some(derived) = derived_magnitude(requested) {
            if handle.has_variable(derived.east) && handle.has_variable(derived.north) {
                let leveled = match level {
                    Some(_) => !handle.level_values(derived.east)?.is_empty(),
                    None => false,
                };
                return Ok(VariablePlan::VectorMagnitude {
                    east: derived.east.to_string(),
                    north: derived.north.to_string(),
                    level: if leveled { level } else { None },
                });
            }
            debug!(
                variable = %requested,
                east = derived.east,
                north = derived.north,
                "Derived variable components missing"
            );
        }

        Err(GridProcessorError::UnknownVariable(requested.to_string()))
    }

    /// Key under which the colour statistics for this plan are cached.
    pub fn stats_key(&self) -> String {
        self.to_string()
    }

    /// Resample the plan onto tile `coord`.
    pub fn render(
        &self,
        handle: &dyn GridHandle,
        time_ordinal: usize,
        coord: &TileCoord,
        method: Interpolation,
    ) -> Result<ResampledTile> {
        match self {
            VariablePlan::Plain(name) => {
                resample::sample(handle, name, time_ordinal, None, coord, method)
            }
            VariablePlan::Leveled { name, level } => {
                let ordinal = level_ordinal(handle, name, *level)?;
                resample::sample(handle, name, time_ordinal, ordinal, coord, method)
            }
            VariablePlan::VectorMagnitude { east, north, level } => {
                let east_tile =
                    sample_component(handle, east, *level, time_ordinal, coord, method)?;
                let north_tile =
                    sample_component(handle, north, *level, time_ordinal, coord, method)?;
                east_tile.magnitude(&north_tile)
            }
        }
    }

    /// 2nd/98th percentile range of the full source field at time ordinal 0.
    pub fn value_range(&self, handle: &dyn GridHandle) -> Result<ValueRange> {
        let values = match self {
            VariablePlan::Plain(name) => resample::load_field(handle, name, 0, None)?.values,
            VariablePlan::Leveled { name, level } => {
                let ordinal = level_ordinal(handle, name, *level)?;
                resample::load_field(handle, name, 0, ordinal)?.values
            }
            VariablePlan::VectorMagnitude { east, north, level } => {
                let (east_ord, north_ord) = match level {
                    Some(l) => (
                        level_ordinal(handle, east, *l)?,
                        level_ordinal(handle, north, *l)?,
                    ),
                    None => (None, None),
                };
                let e = resample::load_field(handle, east, 0, east_ord)?;
                let n = resample::load_field(handle, north, 0, north_ord)?;
                if e.values.len() != n.values.len() {
                    return Err(GridProcessorError::invalid_shape(format!(
                        "components '{}' and '{}' differ in size",
                        east, north
                    )));
                }
                e.values
                    .iter()
                    .zip(&n.values)
                    .map(|(a, b)| a.hypot(*b))
                    .collect()
            }
        };

        robust_range(&values).ok_or_else(|| {
            GridProcessorError::NoValidData(format!("no valid samples for {}", self))
        })
    }
}

impl fmt::Display for VariablePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariablePlan::Plain(name) => write!(f, "{}", name),
            VariablePlan::Leveled { name, level } => write!(f, "{}@{}", name, level),
            VariablePlan::VectorMagnitude {
                east,
                north,
                level: None,
            } => write!(f, "|{},{}|", east, north),
            VariablePlan::VectorMagnitude {
                east,
                north,
                level: Some(level),
            } => write!(f, "|{},{}|@{}", east, north, level),
        }
    }
}

fn level_ordinal(handle: &dyn GridHandle, variable: &str, level: f64) -> Result<Option<usize>> {
    let levels = handle.level_values(variable)?;
    if levels.is_empty() {
        return Ok(None);
    }
    select_level_index(&levels, level).map(Some).ok_or_else(|| {
        GridProcessorError::out_of_range(format!("no usable level on '{}'", variable))
    })
}

fn sample_component(
    handle: &dyn GridHandle,
    variable: &str,
    level: Option<f64>,
    time_ordinal: usize,
    coord: &TileCoord,
    method: Interpolation,
) -> Result<ResampledTile> {
    let ordinal = match level {
        Some(l) => level_ordinal(handle, variable, l)?,
        None => None,
    };
    resample::sample(handle, variable, time_ordinal, ordinal, coord, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geogrid::{DimKind, MemoryGrid};
    use test_utils::{era5_pressure_grid, jan1, uniform_timed_grid};

    fn winds() -> MemoryGrid {
        uniform_timed_grid(
            (-10.0, -10.0, 10.0, 10.0),
            vec![jan1(0)],
            &[("u10", 3.0), ("v10", 4.0), ("t2m", 280.0)],
        )
    }

    #[test]
    fn test_resolve_plain_and_derived() {
        let grid = winds();
        assert_eq!(
            VariablePlan::resolve("t2m", None, &grid).unwrap(),
            VariablePlan::Plain("t2m".into())
        );
        // Level ignored for a variable without a level axis
        assert_eq!(
            VariablePlan::resolve("t2m", Some(500.0), &grid).unwrap(),
            VariablePlan::Plain("t2m".into())
        );
        assert_eq!(
            VariablePlan::resolve("wind10", None, &grid).unwrap(),
            VariablePlan::VectorMagnitude {
                east: "u10".into(),
                north: "v10".into(),
                level: None
            }
        );
    }

    #[test]
    fn test_resolve_unknown() {
        let grid = winds();
        assert!(matches!(
            VariablePlan::resolve("sst", None, &grid),
            Err(GridProcessorError::UnknownVariable(v)) if v == "sst"
        ));
        // Derived name but components absent
        assert!(matches!(
            VariablePlan::resolve("wind100", None, &grid),
            Err(GridProcessorError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_resolve_leveled() {
        let grid = era5_pressure_grid(vec![jan1(0)], vec![1000.0, 500.0, 250.0]);
        let plan = VariablePlan::resolve("z", Some(500.0), &grid).unwrap();
        assert_eq!(
            plan,
            VariablePlan::Leveled {
                name: "z".into(),
                level: 500.0
            }
        );
        assert_eq!(plan.stats_key(), "z@500");
    }

    #[test]
    fn test_leveled_render_picks_nearest_level() {
        let grid = era5_pressure_grid(vec![jan1(0), jan1(6)], vec![1000.0, 500.0, 250.0]);
        let plan = VariablePlan::resolve("z", Some(300.0), &grid).unwrap();
        let coord = TileCoord::new(1, 0, 0).unwrap();
        let tile = plan.render(&grid, 1, &coord, Interpolation::Nearest).unwrap();
        assert!(!tile.all_invalid());
        // 250 hPa at time ordinal 1
        for (v, ok) in tile.values.iter().zip(&tile.valid) {
            if *ok {
                assert_eq!(*v, 2501.0);
            }
        }
    }

    #[test]
    fn test_magnitude_render_and_range() {
        let grid = winds();
        let plan = VariablePlan::resolve("wind10", None, &grid).unwrap();
        // z=6 tile well inside the [-10, 10] box
        let coord = TileCoord::new(6, 32, 31).unwrap();
        let tile = plan.render(&grid, 0, &coord, Interpolation::Linear).unwrap();
        assert_eq!(tile.valid_count(), 256 * 256);
        assert!(tile.values.iter().all(|v| (*v - 5.0).abs() < 1e-5));

        let range = plan.value_range(&grid).unwrap();
        assert!((range.low - 5.0).abs() < 1e-5);
        assert!((range.high - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_value_range_without_valid_samples() {
        let grid = MemoryGrid::new(vec![0.0, 1.0], vec![0.0, 1.0])
            .with_variable(
                "sst",
                &[DimKind::Latitude, DimKind::Longitude],
                vec![f32::NAN; 4],
            )
            .unwrap();
        let plan = VariablePlan::Plain("sst".into());
        assert!(matches!(
            plan.value_range(&grid),
            Err(GridProcessorError::NoValidData(_))
        ));
    }
}

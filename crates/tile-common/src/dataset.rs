//! Dataset type classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse provenance family of a grid file, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    /// ERA5 reanalysis on pressure levels
    Era5,
    /// ERA5 single-level fields (surface, 10 m wind, ...)
    Era5Single,
    /// Copernicus Arctic Regional Reanalysis
    Carra,
    Unknown,
}

/// Filename rules in priority order. Every needle must appear in the
/// lowercased file name for the rule to match.
const FILENAME_RULES: &[(&[&str], DatasetType)] = &[
    (&["carra"], DatasetType::Carra),
    (&["era5", "single"], DatasetType::Era5Single),
    (&["era5"], DatasetType::Era5),
];

impl DatasetType {
    /// Classify a file by substring matching on its name.
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        FILENAME_RULES
            .iter()
            .find(|(needles, _)| needles.iter().all(|n| lower.contains(n)))
            .map(|(_, ty)| *ty)
            .unwrap_or(DatasetType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Era5 => "era5",
            DatasetType::Era5Single => "era5_single",
            DatasetType::Carra => "carra",
            DatasetType::Unknown => "unknown",
        }
    }

    pub fn all() -> &'static [DatasetType] {
        &[
            DatasetType::Era5,
            DatasetType::Era5Single,
            DatasetType::Carra,
            DatasetType::Unknown,
        ]
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown dataset type: {0}")]
pub struct UnknownDatasetType(pub String);

impl FromStr for DatasetType {
    type Err = UnknownDatasetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "era5" => Ok(DatasetType::Era5),
            "era5_single" | "era5-single" => Ok(DatasetType::Era5Single),
            "carra" => Ok(DatasetType::Carra),
            "unknown" => Ok(DatasetType::Unknown),
            other => Err(UnknownDatasetType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_priority() {
        assert_eq!(
            DatasetType::from_filename("ERA5_pressure_20240101.nc"),
            DatasetType::Era5
        );
        assert_eq!(
            DatasetType::from_filename("era5_single_levels_20240101.nc"),
            DatasetType::Era5Single
        );
        assert_eq!(
            DatasetType::from_filename("carra_era5_forced.nc"),
            DatasetType::Carra
        );
        assert_eq!(DatasetType::from_filename("gfs.nc"), DatasetType::Unknown);
    }

    #[test]
    fn test_parse_round_trip_names() {
        for ty in DatasetType::all() {
            assert_eq!(ty.as_str().parse::<DatasetType>().unwrap(), *ty);
        }
        assert!("merra".parse::<DatasetType>().is_err());
    }
}

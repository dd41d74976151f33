//! Tile request parsing.

use serde::Deserialize;

use grid_processor::Interpolation;
use tile_common::{parse_request_time, DatasetType, TileCoord, TileError, TileResult};

use chrono::{DateTime, Utc};

/// Raw query string of a tile request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileQuery {
    pub variable: Option<String>,
    pub time: Option<String>,
    #[serde(alias = "level")]
    pub pressure_level: Option<String>,
    pub dataset: Option<String>,
    pub palette: Option<String>,
    pub interpolation: Option<String>,
}

/// A validated tile request.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub coord: TileCoord,
    pub variable: String,
    pub time: DateTime<Utc>,
    pub level: Option<f64>,
    pub dataset_type: Option<DatasetType>,
    pub palette: Option<String>,
    pub interpolation: Option<Interpolation>,
}

impl TileQuery {
    /// Validate the query for tile `z/x/y`. `y` may carry a `.png` suffix.
    pub fn into_request(self, z: u32, x: u32, y: &str) -> TileResult<TileRequest> {
        let y: u32 = y
            .strip_suffix(".png")
            .unwrap_or(y)
            .parse()
            .map_err(|_| TileError::InvalidRequest(format!("Invalid tile row '{}'", y)))?;
        let coord = TileCoord::new(z, x, y)?;

        let variable = non_empty(self.variable)
            .ok_or_else(|| TileError::InvalidRequest("Missing 'variable' parameter".into()))?;
        let time = non_empty(self.time)
            .ok_or_else(|| TileError::InvalidTime("Missing 'time' parameter".into()))?;
        let time = parse_request_time(&time)?;

        let level = non_empty(self.pressure_level)
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| TileError::InvalidRequest(format!("Invalid level '{}'", raw)))
            })
            .transpose()?;

        let dataset_type = non_empty(self.dataset)
            .map(|raw| {
                raw.parse::<DatasetType>()
                    .map_err(|e| TileError::InvalidRequest(e.to_string()))
            })
            .transpose()?;

        let interpolation = non_empty(self.interpolation)
            .map(|raw| raw.parse::<Interpolation>().map_err(TileError::InvalidRequest))
            .transpose()?;

        Ok(TileRequest {
            coord,
            variable,
            time,
            level,
            dataset_type,
            palette: non_empty(self.palette),
            interpolation,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(variable: &str, time: &str) -> TileQuery {
        TileQuery {
            variable: Some(variable.into()),
            time: Some(time.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_legacy_time_format() {
        let req = query("t2m", "01/01/2024 00:30").into_request(3, 4, "2").unwrap();
        assert_eq!(req.time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap());
        assert_eq!(req.coord, TileCoord::new(3, 4, 2).unwrap());
        assert_eq!(req.level, None);
    }

    #[test]
    fn test_png_suffix_and_options() {
        let mut q = query("z", "2024-01-01T06:00:00Z");
        q.pressure_level = Some("500".into());
        q.dataset = Some("carra".into());
        q.interpolation = Some("nearest".into());
        q.palette = Some(" ".into());
        let req = q.into_request(2, 1, "1.png").unwrap();
        assert_eq!(req.level, Some(500.0));
        assert_eq!(req.dataset_type, Some(DatasetType::Carra));
        assert_eq!(req.interpolation, Some(Interpolation::Nearest));
        assert_eq!(req.palette, None);
    }

    #[test]
    fn test_client_errors() {
        let err = query("t2m", "yesterday").into_request(0, 0, "0").unwrap_err();
        assert!(matches!(err, TileError::InvalidTime(_)));

        let err = query("", "2024-01-01").into_request(0, 0, "0").unwrap_err();
        assert!(matches!(err, TileError::InvalidRequest(_)));

        let err = query("t2m", "2024-01-01").into_request(1, 2, "0").unwrap_err();
        assert!(err.is_client_error());

        let mut q = query("t2m", "2024-01-01");
        q.pressure_level = Some("high".into());
        assert!(q.into_request(0, 0, "0").unwrap_err().is_client_error());

        let mut q = query("t2m", "2024-01-01");
        q.dataset = Some("gfs".into());
        assert!(q.into_request(0, 0, "0").unwrap_err().is_client_error());
    }
}

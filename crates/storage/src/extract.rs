//! Metadata extraction for catalog records.
//!
//! Valid times are found by trying an ordered list of strategies; the first
//! one that yields at least one time wins and is recorded with the record.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use geogrid::{GeoGridResult, GridHandle, GridSource};
use tile_common::{parse_request_time, DatasetType};

/// Where a record's valid times came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Decoded time coordinate (`time` / `valid_time`)
    Coordinate,
    /// Raw time metadata string on the file
    Attribute,
    /// Date embedded in the file name
    Filename,
    /// File modification time
    Modified,
}

/// Strategies in the order they are tried.
pub const TIME_STRATEGIES: [TimeSource; 4] = [
    TimeSource::Coordinate,
    TimeSource::Attribute,
    TimeSource::Filename,
    TimeSource::Modified,
];

impl TimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSource::Coordinate => "coordinate",
            TimeSource::Attribute => "attribute",
            TimeSource::Filename => "filename",
            TimeSource::Modified => "modified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        TIME_STRATEGIES.iter().copied().find(|t| t.as_str() == s)
    }

    /// Run this strategy. `None` means "no answer, try the next one".
    fn extract(&self, handle: &dyn GridHandle, file: &FileStat) -> Option<Vec<DateTime<Utc>>> {
        let times = match self {
            TimeSource::Coordinate => match handle.time_values() {
                Ok(times) => times,
                Err(e) => {
                    debug!(path = %file.path_display(), error = %e, "Time coordinate not decodable");
                    Vec::new()
                }
            },
            TimeSource::Attribute => handle
                .time_attribute()
                .and_then(|raw| parse_request_time(&raw).ok())
                .into_iter()
                .collect(),
            TimeSource::Filename => time_from_filename(&file.file_name).into_iter().collect(),
            TimeSource::Modified => vec![file.modified],
        };
        (!times.is_empty()).then_some(times)
    }
}

/// Filesystem facts about a candidate file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStat {
    pub path: std::path::PathBuf,
    pub file_name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileStat {
    pub fn from_metadata(path: &Path, meta: &std::fs::Metadata) -> Self {
        let modified = meta
            .modified()
            .map(system_time_to_utc)
            .unwrap_or_else(|_| Utc::now());
        Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: meta.len(),
            modified,
        }
    }

    fn path_display(&self) -> std::path::Display<'_> {
        self.path.display()
    }
}

pub fn system_time_to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Everything the catalog stores about one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetadata {
    pub dataset_type: DatasetType,
    pub times: Vec<DateTime<Utc>>,
    pub time_source: TimeSource,
    pub variables: Vec<String>,
}

impl ExtractedMetadata {
    /// The first valid time in file order.
    pub fn representative_time(&self) -> Option<DateTime<Utc>> {
        self.times.first().copied()
    }
}

/// Open `file` through `source` and derive its catalog metadata.
///
/// Fails only when the file cannot be opened or listed; a missing time
/// coordinate falls through to the later strategies.
pub fn extract_metadata(source: &dyn GridSource, file: &FileStat) -> GeoGridResult<ExtractedMetadata> {
    let handle = source.open(&file.path)?;
    let dataset_type = DatasetType::from_filename(&file.file_name);
    let variables = handle.variable_names();

    for strategy in TIME_STRATEGIES {
        if let Some(times) = strategy.extract(handle.as_ref(), file) {
            if strategy != TimeSource::Coordinate {
                warn!(
                    path = %file.path.display(),
                    strategy = strategy.as_str(),
                    "No time coordinate, using fallback valid time"
                );
            }
            return Ok(ExtractedMetadata {
                dataset_type,
                times,
                time_source: strategy,
                variables,
            });
        }
    }

    // Modified always answers
    Ok(ExtractedMetadata {
        dataset_type,
        times: vec![file.modified],
        time_source: TimeSource::Modified,
        variables,
    })
}

/// Find a `YYYYMMDD`, optionally followed by `HH` or `HHMM`, in a file name.
///
/// Digit runs of 8, 10 or 12 characters are tried first. An 8-digit run
/// directly followed by a separator and a 2- or 4-digit run is read as
/// date plus hour (`era5_20240101_06.nc`).
pub fn time_from_filename(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let runs: Vec<&str> = stem
        .split(|c: char| !c.is_ascii_digit())
        .filter(|r| !r.is_empty())
        .collect();

    for (i, run) in runs.iter().enumerate() {
        let parsed = match run.len() {
            8 => {
                let hour = runs
                    .get(i + 1)
                    .filter(|r| r.len() == 2 || r.len() == 4)
                    .and_then(|h| digits_to_datetime(&format!("{}{}", run, h)));
                hour.or_else(|| digits_to_datetime(run))
            }
            10 | 12 => digits_to_datetime(run),
            _ => None,
        };
        if let Some(ndt) = parsed {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

/// `YYYYMMDD[HH[MM]]` to a naive datetime.
fn digits_to_datetime(digits: &str) -> Option<NaiveDateTime> {
    let field = |range: std::ops::Range<usize>| -> Option<u32> {
        digits.get(range).map(|s| s.parse().ok()).unwrap_or(Some(0))
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    date.and_hms_opt(field(8..10)?, field(10..12)?, 0)
}

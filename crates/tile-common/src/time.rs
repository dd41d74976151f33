//! Parsing of request timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Naive layouts accepted for request times, tried in order after RFC 3339.
/// `%m/%d/%Y %H:%M` is what the browser client sends.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Parse a request timestamp as UTC.
pub fn parse_request_time(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Absolute difference between two instants in fractional hours.
pub fn diff_hours(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (a - b).num_seconds().abs() as f64 / 3600.0
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Empty time value")]
    Empty,

    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_request_time("2024-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_offset_converted_to_utc() {
        let dt = parse_request_time("2024-01-15T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_client_format() {
        let dt = parse_request_time("01/02/2024 06:30").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 2, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_and_date_only() {
        assert_eq!(
            parse_request_time("2024-01-01T00:30:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap()
        );
        assert_eq!(
            parse_request_time("2024-03-05").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_request_time("yesterday"),
            Err(TimeParseError::InvalidFormat(_))
        ));
        assert!(matches!(parse_request_time("  "), Err(TimeParseError::Empty)));
    }

    #[test]
    fn test_diff_hours() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap();
        assert_eq!(diff_hours(a, b), 0.5);
        assert_eq!(diff_hours(b, a), 0.5);
    }
}

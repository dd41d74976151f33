//! Decoding of numeric time coordinates with `"<unit> since <reference>"`
//! units. Only the proleptic Gregorian calendar is handled.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::{GeoGridError, GeoGridResult};

/// Parsed form of a CF time `units` attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub reference: DateTime<Utc>,
}

impl TimeUnits {
    pub fn parse(units: &str) -> GeoGridResult<Self> {
        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| GeoGridError::TimeUnits(units.to_string()))?;

        let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
            "days" | "day" | "d" => 86_400.0,
            _ => return Err(GeoGridError::TimeUnits(units.to_string())),
        };

        let reference = parse_reference(reference.trim())
            .ok_or_else(|| GeoGridError::TimeUnits(units.to_string()))?;

        Ok(Self {
            seconds_per_unit,
            reference,
        })
    }

    /// Convert one numeric offset to an instant, rounded to the second.
    pub fn decode(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let seconds = (value * self.seconds_per_unit).round();
        // Duration::seconds panics far outside the representable range
        if seconds.abs() > 1.0e15 {
            return None;
        }
        self.reference
            .checked_add_signed(Duration::seconds(seconds as i64))
    }
}

/// Decode every value of a time coordinate. Non-finite values are an error
/// because they break the ordinal mapping between values and slices.
pub fn decode_times(values: &[f64], units: &str) -> GeoGridResult<Vec<DateTime<Utc>>> {
    let parsed = TimeUnits::parse(units)?;
    values
        .iter()
        .map(|&v| {
            parsed
                .decode(v)
                .ok_or_else(|| GeoGridError::InvalidFormat(format!("time value {} not decodable", v)))
        })
        .collect()
}

fn parse_reference(s: &str) -> Option<DateTime<Utc>> {
    // Strip a trailing zone designator; only UTC references are expected
    let s = s
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches(" +00:00")
        .trim();

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    // CF allows unpadded fields such as "1900-1-1"
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_since_1900() {
        let times = decode_times(&[1_088_568.0], "hours since 1900-01-01 00:00:00.0").unwrap();
        assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_seconds_since_epoch() {
        let times = decode_times(&[0.0, 3600.0], "seconds since 1970-01-01").unwrap();
        assert_eq!(times[0], Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(times[1], Utc.with_ymd_and_hms(1970, 1, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_days_with_t_separator() {
        let units = TimeUnits::parse("days since 2024-01-01T00:00:00Z").unwrap();
        assert_eq!(
            units.decode(1.5),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_rejects_unknown_units() {
        assert!(TimeUnits::parse("fortnights since 2024-01-01").is_err());
        assert!(TimeUnits::parse("hours").is_err());
        assert!(decode_times(&[f64::NAN], "hours since 2024-01-01").is_err());
    }
}

//! ISO-8601 parsing shared by the filter and sort engines.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A parsed date/time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoDateTime {
    /// The point in time, normalized to UTC when an offset was given
    pub instant: NaiveDateTime,
    /// The calendar date as written, before any offset normalization
    pub date: NaiveDate,
}

impl IsoDateTime {
    /// Parse a date (`2024-03-01`), a local date-time (`2024-03-01T10:00:00`)
    /// or an RFC 3339 date-time with offset (`2024-03-01T10:00:00+02:00`).
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(Self {
                instant: parsed.naive_utc(),
                date: parsed.date_naive(),
            });
        }
        for format in NAIVE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self {
                    instant: parsed,
                    date: parsed.date(),
                });
            }
        }
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
        Some(Self {
            instant: date.and_hms_opt(0, 0, 0)?,
            date,
        })
    }

    /// Parse a JSON string value. Anything else does not parse.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_date_only() {
        let parsed = IsoDateTime::parse("2024-03-01").unwrap();
        assert_eq!(parsed.date, date(2024, 3, 1));
        assert_eq!(parsed.instant, date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn parse_local_date_time() {
        let parsed = IsoDateTime::parse("2024-03-01T10:15:30.250").unwrap();
        assert_eq!(parsed.date, date(2024, 3, 1));
        assert_eq!(
            parsed.instant,
            date(2024, 3, 1).and_hms_milli_opt(10, 15, 30, 250).unwrap()
        );
        assert!(IsoDateTime::parse("2024-03-01T10:15").is_some());
    }

    #[test]
    fn parse_with_offset_keeps_written_date() {
        let parsed = IsoDateTime::parse("2024-03-01T01:00:00+02:00").unwrap();
        assert_eq!(parsed.date, date(2024, 3, 1));
        assert_eq!(parsed.instant, date(2024, 2, 29).and_hms_opt(23, 0, 0).unwrap());

        let utc = IsoDateTime::parse("2024-03-01T01:00:00Z").unwrap();
        assert_eq!(utc.instant, date(2024, 3, 1).and_hms_opt(1, 0, 0).unwrap());
    }

    #[test]
    fn reject_garbage() {
        assert_eq!(IsoDateTime::parse("yesterday"), None);
        assert_eq!(IsoDateTime::parse("2024-13-01"), None);
        assert_eq!(IsoDateTime::from_value(&json!(20240301)), None);
        assert!(IsoDateTime::from_value(&json!("2024-03-01")).is_some());
    }
}

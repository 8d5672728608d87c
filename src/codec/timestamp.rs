//! Event time parsing

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{BeatsError, Result};

/// Formats accepted for timestamps that carry no offset; these are read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 event time and convert it to UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BeatsError::timestamp_error(value, "timestamp is empty"));
    }

    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(rfc_error) => NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| BeatsError::timestamp_error(value, rfc_error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use proptest::prelude::*;

    #[test]
    fn parses_zulu_timestamps() {
        let parsed = parse_timestamp("2016-04-01T00:00:00.000Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2016, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn converts_offsets_to_utc() {
        let parsed = parse_timestamp("2016-04-01T02:30:00+02:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2016, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn offsetless_timestamps_are_utc() {
        let parsed = parse_timestamp("2016-04-01T12:34:56.789").unwrap();
        assert_eq!(parsed.hour(), 12);
        assert_eq!(parsed.nanosecond(), 789_000_000);
    }

    #[test]
    fn garbage_is_a_timestamp_error() {
        assert!(matches!(parse_timestamp("yesterday"), Err(BeatsError::Timestamp { .. })));
        assert!(matches!(parse_timestamp("  "), Err(BeatsError::Timestamp { .. })));
        assert!(parse_timestamp("2016-13-01T00:00:00Z").is_err());
    }

    proptest! {
        #[test]
        fn prop_offset_never_changes_the_instant(
            seconds in 0i64..4_000_000_000,
            offset_minutes in -720i32..=840,
        ) {
            let instant = Utc.timestamp_opt(seconds, 0).unwrap();
            let offset = chrono::FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let rendered = instant.with_timezone(&offset).to_rfc3339();

            let parsed = parse_timestamp(&rendered).unwrap();
            prop_assert_eq!(parsed, instant);
            prop_assert_eq!(parsed.timezone(), Utc);
        }
    }
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{FunclogsError, Result};

/// Formats an instant the way the logging backend expects inside a filter.
pub fn render_filter_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parses an absolute instant: RFC 3339, a naive ISO-8601 date-time (taken as
/// UTC), or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }

    Err(FunclogsError::Parse(format!(
        "expected ISO-8601 time, got {input}"
    )))
}

/// Like [`parse_instant`], but also accepts a duration (`15m`, `2h`) meaning
/// that long before now.
pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = parse_instant(input) {
        return Ok(ts);
    }

    if let Ok(duration) = humantime::parse_duration(input.trim()) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                FunclogsError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(FunclogsError::Parse(format!(
        "expected ISO-8601 time or duration, got {input}"
    )))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_zero_padded() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(render_filter_timestamp(ts), "2024-03-05T07:08:09Z");
    }

    #[test]
    fn renders_in_utc() {
        let ts = DateTime::parse_from_rfc3339("2024-12-01T02:00:00+02:00").unwrap();
        assert_eq!(
            render_filter_timestamp(ts.with_timezone(&Utc)),
            "2024-12-01T00:00:00Z"
        );
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_instant("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_naive_and_date_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_instant("2024-12-01T00:00:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-12-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-12-01").unwrap(), expected);
    }

    #[test]
    fn parses_duration() {
        let now = Utc::now();
        let ts = parse_time_or_relative("5m").unwrap();
        assert!(ts < now);
        assert!(parse_instant("5m").is_err());
    }

    #[test]
    fn rejects_invalid() {
        assert!(parse_time_or_relative("invalid-time-format").is_err());
        assert!(parse_instant("").is_err());
    }
}

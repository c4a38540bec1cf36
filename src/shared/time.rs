//! Timestamp parsing for document fields.
//!
//! Backends emit `last_message_at` in several shapes. Anything that does not
//! parse is treated as absent, which the list orders after every real time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a document timestamp.
///
/// Accepts RFC 3339 (`2024-01-05T10:00:00.000+00:00`), naive date-times
/// (`2024-01-05T10:00:00`, `2024-01-05 10:00:00.123`) read as UTC, and bare
/// dates (`2024-01-05`) read as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Sort key for an optional timestamp string: milliseconds since the epoch,
/// `None` when missing or unparseable.
///
/// Pre-1970 times are negative, so `None` is the only key below them all.
pub fn sort_millis(raw: Option<&str>) -> Option<i64> {
    raw.and_then(parse_timestamp).map(|ts| ts.timestamp_millis())
}

/// Current time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

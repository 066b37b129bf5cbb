//! Timestamp decoding and relative-time formatting.
//!
//! The backend uses RFC 3339 strings and encodes "never" as Go's zero time
//! (`0001-01-01T00:00:00Z`). Both that sentinel and malformed values decode
//! to `None` instead of failing the whole response.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer};

/// Go zero-time sentinel used by the backend for unset timestamps.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Parse a backend timestamp. Empty, zero-time and malformed input yield `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == ZERO_TIME {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    // Offsets other than Z still land on year 1 for the zero value.
    if parsed.year() <= 1 {
        return None;
    }
    Some(parsed)
}

/// `deserialize_with` helper for optional backend timestamps.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Human relative time ("2 minutes ago", "in an hour").
///
/// Thresholds follow the usual humanize buckets: seconds under 45s, minutes
/// under 45m, hours under 22h, days under 26d, months under ~11 months.
/// Returns an empty string when `ts` is absent.
pub fn format_relative(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts else {
        return String::new();
    };
    let delta = now.signed_duration_since(ts);
    let secs = delta.num_seconds();
    let phrase = humanize(secs.unsigned_abs());
    if secs >= 0 {
        format!("{phrase} ago")
    } else {
        format!("in {phrase}")
    }
}

fn humanize(secs: u64) -> String {
    let secs_f = secs as f64;
    let minutes = (secs_f / 60.0).round() as u64;
    let hours = (secs_f / 3600.0).round() as u64;
    let days = (secs_f / 86_400.0).round() as u64;

    match secs {
        0..45 => "a few seconds".to_string(),
        45..90 => "a minute".to_string(),
        90..2_700 => format!("{minutes} minutes"),
        2_700..5_400 => "an hour".to_string(),
        5_400..79_200 => format!("{hours} hours"),
        79_200..129_600 => "a day".to_string(),
        129_600..2_246_400 => format!("{days} days"),
        2_246_400..3_888_000 => "a month".to_string(),
        3_888_000..27_648_000 => format!("{} months", (days as f64 / 30.0).round() as u64),
        27_648_000..47_347_200 => "a year".to_string(),
        _ => format!("{} years", (days as f64 / 365.0).round() as u64),
    }
}

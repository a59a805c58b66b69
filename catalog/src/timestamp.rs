//! Canonical content-timestamp extraction (C3, §4.3).
//!
//! Front-matter field priority is encoded once, here, per the "Front-matter
//! field priority" redesign flag — tests pin both the order and the
//! ISO/numeric parsing semantics.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

/// The front-matter fields tried, in order, before falling back to mtime.
pub const FIELD_PRIORITY: &[&str] = &[
    "last_edited_time",
    "updatedAt",
    "updated_at",
    "last_edited",
    "createdAt",
    "created_at",
    "created_time",
    "date",
    "last-reviewed",
    "ts",
];

/// Extracts the canonical content-timestamp (epoch ms) from front-matter,
/// trying [`FIELD_PRIORITY`] in order and falling back to `mtime_ms`.
///
/// Returns `None` only when no field parses and `mtime_ms` is also `None`.
#[must_use]
pub fn extract_content_timestamp(
    front_matter: &BTreeMap<String, String>,
    mtime_ms: Option<i64>,
) -> Option<i64> {
    for field in FIELD_PRIORITY {
        if let Some(value) = front_matter.get(*field) {
            if let Some(ms) = parse_timestamp(value) {
                return Some(ms);
            }
        }
    }
    mtime_ms
}

/// Parses a single timestamp value as ISO-8601, a date-only string
/// (interpreted as UTC midnight), or a numeric epoch value (seconds if
/// `<= 1e11`, else milliseconds). Returns `None` if nothing matches.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
        return Some(dt.timestamp_millis());
    }

    if let Ok(num) = trimmed.parse::<f64>() {
        if num.is_finite() && num >= 0.0 {
            return Some(if num <= 1e11 {
                (num * 1000.0) as i64
            } else {
                num as i64
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_priority_prefers_earlier_field() {
        let mut fm = BTreeMap::new();
        fm.insert("date".to_string(), "2020-01-01".to_string());
        fm.insert("updatedAt".to_string(), "2024-06-15T00:00:00Z".to_string());
        let ts = extract_content_timestamp(&fm, None).unwrap();
        assert_eq!(ts, parse_timestamp("2024-06-15T00:00:00Z").unwrap());
    }

    #[test]
    fn falls_through_unparsable_fields() {
        let mut fm = BTreeMap::new();
        fm.insert("updatedAt".to_string(), "not-a-date".to_string());
        fm.insert("date".to_string(), "2020-01-01".to_string());
        let ts = extract_content_timestamp(&fm, None).unwrap();
        assert_eq!(ts, parse_timestamp("2020-01-01").unwrap());
    }

    #[test]
    fn falls_back_to_mtime_when_nothing_parses() {
        let fm = BTreeMap::new();
        assert_eq!(extract_content_timestamp(&fm, Some(1_700_000_000_000)), Some(1_700_000_000_000));
    }

    #[test]
    fn none_when_no_fields_and_no_mtime() {
        let fm = BTreeMap::new();
        assert_eq!(extract_content_timestamp(&fm, None), None);
    }

    #[test]
    fn date_only_is_utc_midnight() {
        let ms = parse_timestamp("2024-06-15").unwrap();
        let dt = DateTime::from_timestamp_millis(ms).unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn epoch_seconds_vs_millis() {
        let seconds = parse_timestamp("1700000000").unwrap();
        assert_eq!(seconds, 1_700_000_000_000);
        let millis = parse_timestamp("1700000000000").unwrap();
        assert_eq!(millis, 1_700_000_000_000);
    }

    #[test]
    fn deterministic_for_same_input() {
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00Z"),
            parse_timestamp("2024-01-01T00:00:00Z")
        );
    }
}

//! Mapping of every raw source shape onto [`MetricsRecord`].
//!
//! Normalization is total: unknown shapes, wrong types and missing fields all
//! produce a record with zero counts and the [`UNKNOWN_STREAMER`] name.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::acquisition::utils::json_count;
use crate::acquisition::{RawRecord, ScrapedStats};
use crate::record::{MetricsRecord, UNKNOWN_STREAMER};
use crate::stream_key::StreamKey;

const COUNT_KEYS: [&str; 4] = ["likes", "viewers", "comments", "gifts"];

/// Normalizes `raw` into a record stamped with `timestamp`.
pub fn normalize(raw: &RawRecord, stream_key: &StreamKey, timestamp: DateTime<Utc>) -> MetricsRecord {
    match raw {
        RawRecord::Json(value) => from_json(value, stream_key, timestamp),
        RawRecord::Scraped(stats) => from_scraped(stats, stream_key, timestamp),
    }
}

/// Normalizes one row of the history endpoint, stamped with the row's own
/// `timestamp` when it has a readable one and with `fallback` otherwise.
pub fn normalize_history_row(
    row: &Value,
    stream_key: &StreamKey,
    fallback: DateTime<Utc>,
) -> MetricsRecord {
    let timestamp = row
        .get("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or(fallback);
    from_json(row, stream_key, timestamp)
}

fn from_scraped(stats: &ScrapedStats, stream_key: &StreamKey, timestamp: DateTime<Utc>) -> MetricsRecord {
    let name = stats
        .streamer_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_STREAMER);

    MetricsRecord::new(timestamp, stream_key.clone(), name).with_counts(
        stats.likes.unwrap_or(0),
        stats.viewers.unwrap_or(0),
        stats.comments.unwrap_or(0),
        stats.gifts.unwrap_or(0),
    )
}

fn from_json(value: &Value, stream_key: &StreamKey, timestamp: DateTime<Utc>) -> MetricsRecord {
    let name = value
        .pointer("/broadcaster/name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            value
                .get("streamer_name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
        })
        .unwrap_or(UNKNOWN_STREAMER);

    // Nested `stats` object first, top-level fields otherwise.
    let counts = value
        .get("stats")
        .filter(|stats| stats.is_object())
        .unwrap_or(value);
    let [likes, viewers, comments, gifts] =
        COUNT_KEYS.map(|key| counts.get(key).and_then(json_count).unwrap_or(0));

    MetricsRecord::new(timestamp, stream_key.clone(), name).with_counts(likes, viewers, comments, gifts)
}

/// Accepts RFC 3339, `YYYY-mm-dd HH:MM:SS[.fff]` (taken as UTC) and Unix
/// seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn counts(record: &MetricsRecord) -> (u64, u64, u64, u64) {
        (record.likes, record.viewers, record.comments, record.gifts)
    }

    #[test]
    fn test_nested_api_shape() {
        let raw = RawRecord::Json(json!({
            "broadcaster": {"name": "X"},
            "stats": {"likes": 5, "viewers": 2, "comments": 1, "gifts": 0}
        }));
        let record = normalize(&raw, &StreamKey::from("x/1"), now());
        assert_eq!(record.streamer_name, "X");
        assert_eq!(counts(&record), (5, 2, 1, 0));
        assert_eq!(record.timestamp, now());
        assert_eq!(record.stream_key.as_str(), "x/1");
    }

    #[test]
    fn test_flat_shape_defaults_missing_fields() {
        let raw = RawRecord::Json(json!({"streamer_name": "Y", "likes": 10}));
        let record = normalize(&raw, &StreamKey::from("y"), now());
        assert_eq!(record.streamer_name, "Y");
        assert_eq!(counts(&record), (10, 0, 0, 0));
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!([1, 2, 3]))]
    #[case(json!("not an object"))]
    #[case(json!({"broadcaster": "nope", "stats": 7}))]
    #[case(json!({"broadcaster": {"name": ""}, "likes": {"n": 1}}))]
    fn test_malformed_json_is_zeroed(#[case] value: Value) {
        let record = normalize(&RawRecord::Json(value), &StreamKey::from("k"), now());
        assert_eq!(record.streamer_name, UNKNOWN_STREAMER);
        assert_eq!(counts(&record), (0, 0, 0, 0));
        assert_eq!(record.timestamp, now());
    }

    #[test]
    fn test_lenient_numbers() {
        let raw = RawRecord::Json(json!({
            "stats": {"likes": "1,500", "viewers": -3, "comments": 4.9, "gifts": true}
        }));
        let record = normalize(&raw, &StreamKey::from("k"), now());
        assert_eq!(counts(&record), (1500, 0, 4, 0));
    }

    #[test]
    fn test_scraped_missing_fields() {
        let raw = RawRecord::Scraped(ScrapedStats {
            streamer_name: Some("  ".to_string()),
            viewers: Some(9),
            ..Default::default()
        });
        let record = normalize(&raw, &StreamKey::from("k"), now());
        assert_eq!(record.streamer_name, UNKNOWN_STREAMER);
        assert_eq!(counts(&record), (0, 9, 0, 0));
    }

    #[rstest]
    #[case(json!({"timestamp": "2024-05-01T10:00:00Z"}), "2024-05-01T10:00:00Z")]
    #[case(json!({"timestamp": "2024-05-01T12:30:00+02:00"}), "2024-05-01T10:30:00Z")]
    #[case(json!({"timestamp": "2024-05-01 09:15:00"}), "2024-05-01T09:15:00Z")]
    #[case(json!({"timestamp": 1714557600}), "2024-05-01T10:00:00Z")]
    #[case(json!({"timestamp": "yesterday"}), "2024-05-01T12:00:00Z")]
    #[case(json!({}), "2024-05-01T12:00:00Z")]
    fn test_history_row_timestamp(#[case] row: Value, #[case] expected: &str) {
        let record = normalize_history_row(&row, &StreamKey::from("k"), now());
        assert_eq!(record.timestamp, expected.parse::<DateTime<Utc>>().unwrap());
    }
}

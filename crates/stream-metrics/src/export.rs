//! CSV projection of a series.

use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fmt::Write;

use crate::record::MetricsRecord;
use crate::stream_key::StreamKey;

pub const CSV_HEADER: &str = "timestamp,stream_id,streamer_name,likes,viewers,comments,gifts";

/// Renders `records` as CSV with a header row, in the order given.
pub fn to_csv(records: &[MetricsRecord]) -> String {
    let mut output = String::with_capacity(64 * (records.len() + 1));
    output.push_str(CSV_HEADER);
    output.push('\n');

    for record in records {
        // Writing into a String cannot fail.
        let _ = writeln!(
            output,
            "{},{},{},{},{},{},{}",
            record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            escape_csv(record.stream_key.as_str()),
            escape_csv(&record.streamer_name),
            record.likes,
            record.viewers,
            record.comments,
            record.gifts,
        );
    }
    output
}

/// Download name for a stream's export, e.g. `stream_alice_s1_20240501_1000.csv`.
pub fn file_name(stream_key: &StreamKey, now: DateTime<Utc>) -> String {
    format!(
        "stream_{}_{}.csv",
        stream_key.as_str().replace('/', "_"),
        now.format("%Y%m%d_%H%M")
    )
}

/// Quotes a CSV field when it holds a separator, quote or line break.
pub fn escape_csv(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_csv() {
        let ts: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let records = vec![
            MetricsRecord::new(ts, StreamKey::from("alice/s1"), "Alice").with_counts(1, 2, 3, 4),
            MetricsRecord::new(ts, StreamKey::from("bob"), "Bob, \"the\" Builder"),
        ];
        let csv = to_csv(&records);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2024-05-01T10:00:00.000Z,alice/s1,Alice,1,2,3,4");
        assert_eq!(
            lines[2],
            "2024-05-01T10:00:00.000Z,bob,\"Bob, \"\"the\"\" Builder\",0,0,0,0"
        );
    }

    #[test]
    fn test_empty_export_has_header() {
        assert_eq!(to_csv(&[]), format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\rbreak"), "\"line\rbreak\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_file_name() {
        let now: DateTime<Utc> = "2024-05-01T10:07:59Z".parse().unwrap();
        assert_eq!(
            file_name(&StreamKey::from("alice/s1"), now),
            "stream_alice_s1_20240501_1007.csv"
        );
    }
}

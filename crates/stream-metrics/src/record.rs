use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stream_key::StreamKey;

/// Streamer name used when no source provides one.
pub const UNKNOWN_STREAMER: &str = "Unknown";

/// One normalized reading of a stream's engagement counters.
///
/// The four metrics are cumulative counts over the stream's lifetime. Nothing
/// enforces that they never decrease, but aggregation and growth rates assume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "stream_id")]
    pub stream_key: StreamKey,
    pub streamer_name: String,
    pub likes: u64,
    pub viewers: u64,
    pub comments: u64,
    pub gifts: u64,
}

impl MetricsRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        stream_key: StreamKey,
        streamer_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            stream_key,
            streamer_name: streamer_name.into(),
            likes: 0,
            viewers: 0,
            comments: 0,
            gifts: 0,
        }
    }

    pub fn with_counts(mut self, likes: u64, viewers: u64, comments: u64, gifts: u64) -> Self {
        self.likes = likes;
        self.viewers = viewers;
        self.comments = comments;
        self.gifts = gifts;
        self
    }

    /// `(likes + comments) / viewers` as a percentage, `0.0` without viewers.
    pub fn engagement_rate(&self) -> f64 {
        if self.viewers == 0 {
            return 0.0;
        }
        (self.likes + self.comments) as f64 / self.viewers as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(likes: u64, viewers: u64, comments: u64) -> MetricsRecord {
        MetricsRecord::new(Utc::now(), StreamKey::from("alice/s1"), "Alice")
            .with_counts(likes, viewers, comments, 0)
    }

    #[test]
    fn test_engagement_rate_without_viewers() {
        assert_eq!(record(10, 0, 5).engagement_rate(), 0.0);
    }

    #[test]
    fn test_engagement_rate() {
        assert_eq!(record(10, 100, 5).engagement_rate(), 15.0);
    }

    #[test]
    fn test_serialized_column_names() {
        let value = serde_json::to_value(record(1, 2, 3)).unwrap();
        let object = value.as_object().unwrap();
        for column in [
            "timestamp",
            "stream_id",
            "streamer_name",
            "likes",
            "viewers",
            "comments",
            "gifts",
        ] {
            assert!(object.contains_key(column), "missing column {column}");
        }
    }
}

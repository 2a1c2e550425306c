//! Append-only per-stream record storage.
//!
//! Records are kept in insertion order. Nothing is deduplicated or reordered at
//! insert time; computations that need time order sort a copy first.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::aggregate::{AggregatedBucket, Granularity, GrowthRates, aggregate};
use crate::record::MetricsRecord;
use crate::stream_key::StreamKey;

/// Change of every metric since the previous reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsDelta {
    pub timestamp: DateTime<Utc>,
    pub likes: i64,
    pub viewers: i64,
    pub comments: i64,
    pub gifts: i64,
    pub comments_per_minute: f64,
}

/// Headline numbers of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    /// Minutes between the earliest and the latest reading.
    pub duration_minutes: f64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub total_gifts: u64,
    pub max_viewers: u64,
    pub mean_viewers: u64,
}

/// Readings of one stream in insertion order.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    stream_key: StreamKey,
    records: Vec<MetricsRecord>,
}

impl TimeSeries {
    pub fn new(stream_key: StreamKey) -> Self {
        Self {
            stream_key,
            records: Vec::new(),
        }
    }

    pub fn stream_key(&self) -> &StreamKey {
        &self.stream_key
    }

    pub fn push(&mut self, record: MetricsRecord) {
        self.records.push(record);
    }

    /// Last inserted record, which is not necessarily the newest by timestamp.
    pub fn latest(&self) -> Option<&MetricsRecord> {
        self.records.last()
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of the records ordered by timestamp; ties keep insertion order.
    pub fn sorted(&self) -> Vec<MetricsRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by_key(|record| record.timestamp);
        sorted
    }

    /// Per-reading changes over the time-ordered series. The first reading has
    /// zero deltas.
    pub fn deltas(&self) -> Vec<MetricsDelta> {
        let sorted = self.sorted();
        let mut deltas = Vec::with_capacity(sorted.len());
        let mut previous: Option<&MetricsRecord> = None;

        for record in &sorted {
            let delta = match previous {
                None => MetricsDelta {
                    timestamp: record.timestamp,
                    likes: 0,
                    viewers: 0,
                    comments: 0,
                    gifts: 0,
                    comments_per_minute: 0.0,
                },
                Some(prev) => {
                    let comments = change(prev.comments, record.comments);
                    let minutes = (record.timestamp - prev.timestamp).as_seconds_f64() / 60.0;
                    MetricsDelta {
                        timestamp: record.timestamp,
                        likes: change(prev.likes, record.likes),
                        viewers: change(prev.viewers, record.viewers),
                        comments,
                        gifts: change(prev.gifts, record.gifts),
                        comments_per_minute: if minutes > 0.0 {
                            comments as f64 / minutes
                        } else {
                            0.0
                        },
                    }
                }
            };
            deltas.push(delta);
            previous = Some(record);
        }
        deltas
    }

    pub fn summary(&self) -> Option<SeriesSummary> {
        let sorted = self.sorted();
        let (first, last) = (sorted.first()?, sorted.last()?);
        let viewers_sum: u128 = sorted.iter().map(|r| u128::from(r.viewers)).sum();

        Some(SeriesSummary {
            duration_minutes: (last.timestamp - first.timestamp).as_seconds_f64() / 60.0,
            total_likes: last.likes,
            total_comments: last.comments,
            total_gifts: last.gifts,
            max_viewers: sorted.iter().map(|r| r.viewers).max().unwrap_or(0),
            mean_viewers: (viewers_sum / sorted.len() as u128) as u64,
        })
    }

    pub fn growth_rates(&self) -> GrowthRates {
        GrowthRates::compute(&self.records)
    }

    pub fn aggregate(&self, granularity: Granularity) -> Vec<AggregatedBucket> {
        aggregate(&self.records, granularity)
    }
}

/// Series of every stream seen in a session.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: FxHashMap<StreamKey, TimeSeries>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the record's stream series, creating it on first use.
    pub fn append(&mut self, record: MetricsRecord) {
        self.series
            .entry(record.stream_key.clone())
            .or_insert_with(|| TimeSeries::new(record.stream_key.clone()))
            .push(record);
    }

    pub fn get(&self, stream_key: &StreamKey) -> Option<&TimeSeries> {
        self.series.get(stream_key)
    }

    pub fn latest(&self, stream_key: &StreamKey) -> Option<&MetricsRecord> {
        self.get(stream_key).and_then(TimeSeries::latest)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Signed difference `to - from`, saturating at the `i64` bounds.
fn change(from: u64, to: u64) -> i64 {
    let diff = i128::from(to) - i128::from(from);
    i64::try_from(diff).unwrap_or(if diff > 0 { i64::MAX } else { i64::MIN })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str, key: &str, likes: u64, viewers: u64, comments: u64) -> MetricsRecord {
        MetricsRecord::new(ts.parse().unwrap(), StreamKey::from(key), "Alice")
            .with_counts(likes, viewers, comments, 0)
    }

    fn series(records: Vec<MetricsRecord>) -> TimeSeries {
        let mut series = TimeSeries::new(StreamKey::from("a"));
        records.into_iter().for_each(|r| series.push(r));
        series
    }

    #[test]
    fn test_latest_is_last_inserted() {
        let series = series(vec![
            record("2024-05-01T10:05:00Z", "a", 5, 1, 1),
            record("2024-05-01T10:00:00Z", "a", 1, 1, 1),
        ]);
        assert_eq!(series.latest().unwrap().likes, 1);
        assert_eq!(series.sorted()[1].likes, 5);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_deltas() {
        let series = series(vec![
            record("2024-05-01T10:00:00Z", "a", 10, 5, 0),
            record("2024-05-01T10:02:00Z", "a", 30, 4, 10),
            record("2024-05-01T10:02:00Z", "a", 31, 4, 12),
        ]);
        let deltas = series.deltas();
        assert_eq!(deltas.len(), 3);
        assert_eq!((deltas[0].likes, deltas[0].comments_per_minute), (0, 0.0));
        assert_eq!(deltas[1].likes, 20);
        assert_eq!(deltas[1].viewers, -1);
        assert_eq!(deltas[1].comments_per_minute, 5.0);
        // Same timestamp: no rate.
        assert_eq!(deltas[2].comments, 2);
        assert_eq!(deltas[2].comments_per_minute, 0.0);
    }

    #[test]
    fn test_summary() {
        let series = series(vec![
            record("2024-05-01T10:00:00Z", "a", 10, 5, 1),
            record("2024-05-01T10:30:00Z", "a", 90, 20, 7),
            record("2024-05-01T10:15:00Z", "a", 50, 12, 3),
        ]);
        let summary = series.summary().unwrap();
        assert_eq!(summary.duration_minutes, 30.0);
        assert_eq!(summary.total_likes, 90);
        assert_eq!(summary.total_comments, 7);
        assert_eq!(summary.max_viewers, 20);
        assert_eq!(summary.mean_viewers, 12);
        assert!(TimeSeries::new(StreamKey::from("a")).summary().is_none());
    }

    #[test]
    fn test_store_keeps_streams_apart() {
        let mut store = SeriesStore::new();
        store.append(record("2024-05-01T10:00:00Z", "b", 1, 1, 1));
        store.append(record("2024-05-01T10:00:00Z", "a", 2, 1, 1));
        store.append(record("2024-05-01T10:01:00Z", "a", 3, 1, 1));

        let a = StreamKey::from("a");
        assert_eq!(store.get(&a).unwrap().len(), 2);
        assert_eq!(store.latest(&a).unwrap().likes, 3);
        assert_eq!(store.latest(&StreamKey::from("b")).unwrap().likes, 1);
        assert!(store.get(&StreamKey::from("c")).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_deltas_saturate_on_huge_counts() {
        let mut series = TimeSeries::new(StreamKey::from("a"));
        series.push(record("2024-05-01T10:00:00Z", "a", 0, 5, 0));
        series.push(record("2024-05-01T10:01:00Z", "a", u64::MAX, 5, 0));
        series.push(record("2024-05-01T10:02:00Z", "a", 0, 5, 0));

        let deltas = series.deltas();
        assert_eq!(deltas[1].likes, i64::MAX);
        assert_eq!(deltas[2].likes, i64::MIN);
        assert_eq!(deltas[1].viewers, 0);
    }
}

//! Time bucketing and derived rates over normalized records.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::MetricsRecord;
use crate::stream_key::StreamKey;

/// Width of an aggregation bucket.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Granularity {
    #[default]
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn seconds(self) -> i64 {
        match self {
            Granularity::Minute => 60,
            Granularity::Hour => 3_600,
            Granularity::Day => 86_400,
        }
    }

    /// Start of the bucket containing `timestamp`, on the UTC clock.
    pub fn floor(self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.seconds();
        let excess = TimeDelta::seconds(timestamp.timestamp().rem_euclid(width))
            + TimeDelta::nanoseconds(i64::from(timestamp.timestamp_subsec_nanos()));
        timestamp - excess
    }
}

/// Coalesced readings of one stream in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub time_group: DateTime<Utc>,
    #[serde(rename = "stream_id")]
    pub stream_key: StreamKey,
    pub streamer_name: String,
    pub likes: u64,
    pub viewers: u64,
    pub comments: u64,
    pub gifts: u64,
}

/// Groups records by `(bucket, stream)` keeping the first streamer name and the
/// maximum of each metric. Buckets come back ordered by time, then stream key.
pub fn aggregate(records: &[MetricsRecord], granularity: Granularity) -> Vec<AggregatedBucket> {
    let mut buckets: BTreeMap<(DateTime<Utc>, &StreamKey), AggregatedBucket> = BTreeMap::new();

    for record in records {
        let time_group = granularity.floor(record.timestamp);
        buckets
            .entry((time_group, &record.stream_key))
            .and_modify(|bucket| {
                bucket.likes = bucket.likes.max(record.likes);
                bucket.viewers = bucket.viewers.max(record.viewers);
                bucket.comments = bucket.comments.max(record.comments);
                bucket.gifts = bucket.gifts.max(record.gifts);
            })
            .or_insert_with(|| AggregatedBucket {
                time_group,
                stream_key: record.stream_key.clone(),
                streamer_name: record.streamer_name.clone(),
                likes: record.likes,
                viewers: record.viewers,
                comments: record.comments,
                gifts: record.gifts,
            });
    }

    buckets.into_values().collect()
}

/// Average change per minute of each metric across a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthRates {
    pub likes: f64,
    pub viewers: f64,
    pub comments: f64,
    pub gifts: f64,
}

impl GrowthRates {
    /// Rates between the earliest and latest record of `records`.
    ///
    /// Elapsed time is floored to one minute; fewer than two records give zeros.
    pub fn compute(records: &[MetricsRecord]) -> Self {
        let (Some(first), Some(last)) = (
            records.iter().min_by_key(|r| r.timestamp),
            records.iter().max_by_key(|r| r.timestamp),
        ) else {
            return Self::default();
        };
        if records.len() < 2 {
            return Self::default();
        }

        let elapsed = (last.timestamp - first.timestamp).as_seconds_f64() / 60.0;
        let minutes = elapsed.max(1.0);
        let rate = |from: u64, to: u64| (to as f64 - from as f64) / minutes;

        Self {
            likes: rate(first.likes, last.likes),
            viewers: rate(first.viewers, last.viewers),
            comments: rate(first.comments, last.comments),
            gifts: rate(first.gifts, last.gifts),
        }
    }
}

use chrono::{Local, NaiveTime, Timelike};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::info;

use super::utils::capitalize;
use super::{RawRecord, ScrapedStats};
use crate::stream_key::StreamKey;

/// Stream key reserved for connectivity self-checks.
pub const TEST_STREAM_KEY: &str = "test";

/// The fixed record returned for [`TEST_STREAM_KEY`].
pub fn test_record() -> RawRecord {
    RawRecord::Scraped(ScrapedStats {
        streamer_name: Some("Test Streamer".to_string()),
        likes: Some(150),
        viewers: Some(50),
        comments: Some(75),
        gifts: Some(10),
    })
}

/// Terminal source of the chain: plausible values derived from the wall clock,
/// generated without any network access.
///
/// Values grow with the minute of the day. Each stream key keeps a high-water
/// mark so the counters never decrease, including across midnight.
#[derive(Debug, Default)]
pub struct SyntheticSource {
    high_water: Mutex<FxHashMap<StreamKey, [u64; 4]>>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, stream_key: &StreamKey) -> RawRecord {
        self.generate_at(stream_key, Local::now().time())
    }

    pub fn generate_at(&self, stream_key: &StreamKey, time: NaiveTime) -> RawRecord {
        let minute_of_day = u64::from(time.hour() * 60 + time.minute());
        let fresh = [
            100 + minute_of_day * 5,
            20 + minute_of_day / 2,
            50 + minute_of_day * 3,
            5 + minute_of_day / 4,
        ];

        let [likes, viewers, comments, gifts] = {
            let mut high_water = self.high_water.lock();
            let entry = high_water.entry(stream_key.clone()).or_insert(fresh);
            for (kept, value) in entry.iter_mut().zip(fresh) {
                *kept = (*kept).max(value);
            }
            *entry
        };

        info!(stream_key = %stream_key, "Using synthetic metrics");

        let broadcaster = stream_key.broadcaster();
        RawRecord::Scraped(ScrapedStats {
            streamer_name: (!broadcaster.is_empty()).then(|| capitalize(broadcaster)),
            likes: Some(likes),
            viewers: Some(viewers),
            comments: Some(comments),
            gifts: Some(gifts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(record: RawRecord) -> ScrapedStats {
        match record {
            RawRecord::Scraped(stats) => stats,
            other => panic!("unexpected record: {other:?}"),
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_values_follow_clock() {
        let source = SyntheticSource::new();
        let key = StreamKey::from("alice/s1");
        let stats = counts(source.generate_at(&key, at(1, 30)));
        assert_eq!(stats.streamer_name.as_deref(), Some("Alice"));
        assert_eq!(stats.likes, Some(100 + 90 * 5));
        assert_eq!(stats.viewers, Some(20 + 45));
        assert_eq!(stats.comments, Some(50 + 270));
        assert_eq!(stats.gifts, Some(5 + 22));
    }

    #[test]
    fn test_values_never_decrease_across_midnight() {
        let source = SyntheticSource::new();
        let key = StreamKey::from("alice/s1");
        let before = counts(source.generate_at(&key, at(23, 59)));
        let after = counts(source.generate_at(&key, at(0, 1)));
        assert_eq!(before, after);

        // Other keys are unaffected.
        let other = counts(source.generate_at(&StreamKey::from("bob"), at(0, 1)));
        assert_eq!(other.likes, Some(105));
    }

    #[test]
    fn test_record_is_fixed() {
        assert_eq!(test_record(), test_record());
        let stats = counts(test_record());
        assert_eq!(stats.likes, Some(150));
        assert_eq!(stats.gifts, Some(10));
    }
}

//! Tracking session: the selected stream, its accumulated series and the
//! refresh clock.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::acquisition::AcquisitionChain;
use crate::normalize::normalize;
use crate::record::MetricsRecord;
use crate::series::{SeriesStore, TimeSeries};
use crate::stream_key::StreamKey;

/// Result of a refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// No stream is selected, or its key is empty. Nothing was acquired.
    Skipped,
    /// A record was acquired and appended.
    Updated(MetricsRecord),
}

/// State of one tracking session. Dropping it (or calling
/// [`Session::finish`]) discards everything collected.
#[derive(Debug)]
pub struct Session {
    update_frequency: Duration,
    current: Option<StreamKey>,
    store: SeriesStore,
    last_update: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(update_frequency: Duration) -> Self {
        Self {
            update_frequency,
            current: None,
            store: SeriesStore::new(),
            last_update: None,
        }
    }

    /// Selects the stream refreshed from now on.
    pub fn track(&mut self, stream_key: StreamKey) {
        if self.current.as_ref() != Some(&stream_key) {
            info!(stream_key = %stream_key, "Tracking stream");
        }
        self.current = Some(stream_key);
    }

    pub fn current(&self) -> Option<&StreamKey> {
        self.current.as_ref()
    }

    /// Series of the selected stream, if it has any readings.
    pub fn series(&self) -> Option<&TimeSeries> {
        self.current.as_ref().and_then(|key| self.store.get(key))
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn update_frequency(&self) -> Duration {
        self.update_frequency
    }

    /// True when nothing has been collected yet or a full interval has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_update {
            None => true,
            Some(last) => (now - last).to_std().unwrap_or_default() >= self.update_frequency,
        }
    }

    /// Wait before the next refresh is due, never less than one second.
    pub fn time_to_refresh(&self, now: DateTime<Utc>) -> Duration {
        let remaining = match self.last_update {
            None => self.update_frequency,
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or_default();
                self.update_frequency.saturating_sub(elapsed)
            }
        };
        remaining.max(Duration::from_secs(1))
    }

    pub async fn refresh(&mut self, chain: &AcquisitionChain) -> RefreshOutcome {
        self.refresh_at(chain, Utc::now()).await
    }

    /// Acquires one reading of the selected stream stamped with `now`.
    pub async fn refresh_at(&mut self, chain: &AcquisitionChain, now: DateTime<Utc>) -> RefreshOutcome {
        let Some(stream_key) = self.current.clone().filter(|key| !key.is_empty()) else {
            debug!("No stream selected, skipping refresh");
            return RefreshOutcome::Skipped;
        };
        let Some(raw) = chain.acquire(&stream_key).await else {
            return RefreshOutcome::Skipped;
        };

        let record = normalize(&raw, &stream_key, now);
        debug!(
            stream_key = %stream_key,
            likes = record.likes,
            viewers = record.viewers,
            comments = record.comments,
            gifts = record.gifts,
            "Recorded metrics"
        );
        self.store.append(record.clone());
        self.last_update = Some(now);
        RefreshOutcome::Updated(record)
    }

    /// Appends a caller-built record and selects its stream.
    pub fn record_manual(&mut self, record: MetricsRecord) {
        let stamp = self
            .last_update
            .map_or(record.timestamp, |last| last.max(record.timestamp));
        self.last_update = Some(stamp);
        self.track(record.stream_key.clone());
        self.store.append(record);
    }

    /// Ends the session, handing back what was collected.
    pub fn finish(self) -> SeriesStore {
        info!(streams = self.store.len(), "Session finished");
        self.store
    }
}

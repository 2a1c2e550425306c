use chrono::{DateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::api::{ApiClient, ApiStrategy};
use super::client::{HttpSource, default_client};
use super::error::AcquisitionError;
use super::page_elements::PageElementsStrategy;
use super::page_script::PageScriptStrategy;
use super::synthetic::{SyntheticSource, TEST_STREAM_KEY, test_record};
use super::{AcquisitionStrategy, Attempt, AttemptContext, PageSource, RawRecord, ScrapedStats};
use crate::config::PlatformConfig;
use crate::normalize::{normalize, normalize_history_row};
use crate::record::MetricsRecord;
use crate::stream_key::StreamKey;

/// Which kind of source is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The structured API answers its health check.
    Api,
    /// The API is down but page scraping produces records.
    Scraper,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Api => write!(f, "connected (API)"),
            ConnectionStatus::Scraper => write!(f, "connected (web scraping)"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Ordered fallback over the metric sources.
///
/// Strategies run left to right. A `Complete` attempt ends the chain, a
/// `Partial` one is remembered and merged with later results, and errors are
/// logged and treated as misses. When nothing usable comes back the
/// [`SyntheticSource`] produces the record.
pub struct AcquisitionChain {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
    fallback: SyntheticSource,
    pages: PageSource,
    api: Arc<ApiClient>,
}

impl AcquisitionChain {
    /// Chain over API, page script and page elements, sharing `client`.
    pub fn new(config: &PlatformConfig, client: Client) -> Self {
        let http = HttpSource::new(client);
        let api = Arc::new(ApiClient::new(http.clone(), config.clone()));
        let strategies: Vec<Box<dyn AcquisitionStrategy>> = vec![
            Box::new(ApiStrategy::new(api.clone())),
            Box::new(PageScriptStrategy::new()),
            Box::new(PageElementsStrategy::new()),
        ];

        Self {
            strategies,
            fallback: SyntheticSource::new(),
            pages: PageSource::new(http, config.clone()),
            api,
        }
    }

    /// Same as [`AcquisitionChain::new`] with the default TLS client.
    pub fn with_defaults(config: &PlatformConfig) -> Result<Self, AcquisitionError> {
        Ok(Self::new(config, default_client()?))
    }

    /// Raw metrics for `stream_key`, or `None` when the key is empty.
    ///
    /// Never fails for a non-empty key: source errors are logged and the
    /// synthetic fallback ends the chain.
    pub async fn acquire(&self, stream_key: &StreamKey) -> Option<RawRecord> {
        if stream_key.is_empty() {
            return None;
        }
        if stream_key.as_str() == TEST_STREAM_KEY {
            return Some(test_record());
        }

        let ctx = AttemptContext::new(stream_key, &self.pages);
        let mut pending: Option<ScrapedStats> = None;

        for strategy in &self.strategies {
            match strategy.attempt(&ctx).await {
                Ok(Attempt::Complete(RawRecord::Scraped(stats))) => {
                    debug!(stream_key = %stream_key, source = strategy.name(), "Acquired metrics");
                    let stats = match pending {
                        Some(pending) => pending.or(stats),
                        None => stats,
                    };
                    return Some(RawRecord::Scraped(stats));
                }
                Ok(Attempt::Complete(record)) => {
                    debug!(stream_key = %stream_key, source = strategy.name(), "Acquired metrics");
                    return Some(record);
                }
                Ok(Attempt::Partial(stats)) => {
                    debug!(stream_key = %stream_key, source = strategy.name(), "Partial metrics");
                    pending = Some(match pending {
                        Some(pending) => pending.or(stats),
                        None => stats,
                    });
                }
                Ok(Attempt::Miss) => {
                    debug!(stream_key = %stream_key, source = strategy.name(), "No metrics");
                }
                Err(e) if e.is_unavailable() => {
                    debug!(stream_key = %stream_key, source = strategy.name(), "Source unavailable");
                }
                Err(e) => {
                    warn!(stream_key = %stream_key, source = strategy.name(), error = %e, "Source failed");
                }
            }
        }

        if let Some(stats) = pending {
            return Some(RawRecord::Scraped(stats));
        }
        info!(stream_key = %stream_key, "All sources failed, falling back to synthetic metrics");
        Some(self.fallback.generate(stream_key))
    }

    /// [`acquire`](Self::acquire) followed by normalization at `Utc::now()`.
    pub async fn acquire_record(&self, stream_key: &StreamKey) -> Option<MetricsRecord> {
        let raw = self.acquire(stream_key).await?;
        Some(normalize(&raw, stream_key, Utc::now()))
    }

    /// Checks the sources the way a connectivity indicator would.
    pub async fn check_connection(&self) -> ConnectionStatus {
        if self.api.is_available().await {
            return ConnectionStatus::Api;
        }
        match self.acquire(&StreamKey::from(TEST_STREAM_KEY)).await {
            Some(_) => ConnectionStatus::Scraper,
            None => ConnectionStatus::Disconnected,
        }
    }

    /// Normalized historical readings from the API; empty when unavailable.
    pub async fn history(
        &self,
        stream_key: &StreamKey,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<MetricsRecord> {
        if stream_key.is_empty() {
            return Vec::new();
        }
        let now = Utc::now();
        self.api
            .fetch_history(stream_key, start, end)
            .await
            .iter()
            .map(|row| normalize_history_row(row, stream_key, now))
            .collect()
    }
}

//! Acquisition of raw metrics for a stream key.
//!
//! Sources are tried in priority order by [`AcquisitionChain`]; the first one
//! that produces usable data wins. Every source failure is logged and
//! swallowed, and [`SyntheticSource`] terminates the chain so a non-empty key
//! always yields a record.

pub mod api;
pub mod chain;
pub mod client;
pub mod error;
pub mod page_elements;
pub mod page_script;
pub mod synthetic;
pub mod utils;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::warn;

pub use api::{ApiClient, ApiStrategy};
pub use chain::{AcquisitionChain, ConnectionStatus};
pub use client::{HttpSource, default_client};
pub use error::AcquisitionError;
pub use page_elements::PageElementsStrategy;
pub use page_script::{PageScriptStrategy, StatsShape};
pub use synthetic::SyntheticSource;

use crate::config::PlatformConfig;
use crate::stream_key::StreamKey;

/// Metrics as produced by a source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// Body returned by the structured API, either nested
    /// (`broadcaster.name`, `stats.*`) or flat.
    Json(serde_json::Value),
    /// Values read from the stream page or generated locally.
    Scraped(ScrapedStats),
}

/// Field-by-field scrape result; `None` marks a field no source has found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedStats {
    pub streamer_name: Option<String>,
    pub likes: Option<u64>,
    pub viewers: Option<u64>,
    pub comments: Option<u64>,
    pub gifts: Option<u64>,
}

impl ScrapedStats {
    pub fn has_counts(&self) -> bool {
        self.likes.is_some()
            || self.viewers.is_some()
            || self.comments.is_some()
            || self.gifts.is_some()
    }

    /// Fills every field still missing in `self` from `other`.
    pub fn or(self, other: ScrapedStats) -> ScrapedStats {
        ScrapedStats {
            streamer_name: self.streamer_name.or(other.streamer_name),
            likes: self.likes.or(other.likes),
            viewers: self.viewers.or(other.viewers),
            comments: self.comments.or(other.comments),
            gifts: self.gifts.or(other.gifts),
        }
    }
}

/// Outcome of one source.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// Usable data; ends the chain.
    Complete(RawRecord),
    /// Some fields were found. Later sources fill in what is missing.
    Partial(ScrapedStats),
    /// Nothing usable; the next source is tried.
    Miss,
}

/// State shared by the sources of one acquisition.
///
/// The stream page is downloaded at most once, on first request, and reused by
/// every page-based source.
pub struct AttemptContext<'a> {
    stream_key: &'a StreamKey,
    pages: Option<&'a PageSource>,
    page: OnceCell<Option<String>>,
}

impl<'a> AttemptContext<'a> {
    pub fn new(stream_key: &'a StreamKey, pages: &'a PageSource) -> Self {
        Self {
            stream_key,
            pages: Some(pages),
            page: OnceCell::new(),
        }
    }

    /// A context whose page is already known, or known to be unavailable.
    pub fn with_page(stream_key: &'a StreamKey, page: Option<String>) -> Self {
        Self {
            stream_key,
            pages: None,
            page: OnceCell::new_with(Some(page)),
        }
    }

    pub fn stream_key(&self) -> &StreamKey {
        self.stream_key
    }

    /// The stream page HTML, or `None` when it could not be fetched.
    pub async fn page(&self) -> Option<&str> {
        self.page
            .get_or_init(|| async {
                let pages = self.pages?;
                match pages.fetch(self.stream_key).await {
                    Ok(html) => Some(html),
                    Err(e) => {
                        warn!(stream_key = %self.stream_key, error = %e, "Stream page unavailable");
                        None
                    }
                }
            })
            .await
            .as_deref()
    }
}

/// Downloads stream pages.
#[derive(Debug, Clone)]
pub struct PageSource {
    http: HttpSource,
    config: PlatformConfig,
}

impl PageSource {
    pub fn new(http: HttpSource, config: PlatformConfig) -> Self {
        Self { http, config }
    }

    pub async fn fetch(&self, stream_key: &StreamKey) -> Result<String, AcquisitionError> {
        let url = self.config.page_url(&client::encode_path(stream_key.as_str()));
        let response = self.http.get_ok(&url, self.config.page_timeout).await?;
        Ok(response.text().await?)
    }
}

/// One source in the acquisition chain.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt, AcquisitionError>;
}

//! Live-stream engagement metrics.
//!
//! The crate acquires likes, viewers, comments and gifts for a stream through an
//! ordered fallback chain (structured API, embedded page script, page elements,
//! synthetic values), normalizes every source into a [`MetricsRecord`], appends
//! the records into a per-stream [`TimeSeries`] and derives aggregates from it.
//!
//! ```rust,no_run
//! use stream_metrics::{AcquisitionChain, AcquisitionError, PlatformConfig, Session};
//!
//! # async fn run() -> Result<(), AcquisitionError> {
//! let config = PlatformConfig::default();
//! let chain = AcquisitionChain::with_defaults(&config)?;
//! let mut session = Session::new(std::time::Duration::from_secs(60));
//!
//! let key = config.stream_key_parser().parse("https://jaco.live/alice/stream42");
//! session.track(key);
//! session.refresh(&chain).await;
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod aggregate;
pub mod config;
pub mod export;
pub mod normalize;
pub mod record;
pub mod series;
pub mod session;
pub mod stream_key;

pub use acquisition::{AcquisitionChain, AcquisitionError, ConnectionStatus, RawRecord};
pub use aggregate::{AggregatedBucket, Granularity, GrowthRates, aggregate};
pub use config::PlatformConfig;
pub use record::MetricsRecord;
pub use series::{MetricsDelta, SeriesStore, SeriesSummary, TimeSeries};
pub use session::{RefreshOutcome, Session};
pub use stream_key::{StreamKey, StreamKeyParser};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::stream_key::StreamKeyParser;

/// Endpoints and timeouts of the tracked platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Host recognised in stream page URLs, e.g. `jaco.live`.
    pub host: String,
    /// Base of the structured API (`{api_base_url}/status`, `{api_base_url}/streams/...`).
    pub api_base_url: String,
    /// Base of the public stream pages (`{page_base_url}/{stream_key}`).
    pub page_base_url: String,
    #[serde(with = "secs")]
    pub status_timeout: Duration,
    #[serde(with = "secs")]
    pub stats_timeout: Duration,
    #[serde(with = "secs")]
    pub page_timeout: Duration,
    #[serde(with = "secs")]
    pub history_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            host: "jaco.live".to_string(),
            api_base_url: "https://api.jaco.live/v1".to_string(),
            page_base_url: "https://jaco.live".to_string(),
            status_timeout: Duration::from_secs(5),
            stats_timeout: Duration::from_secs(10),
            page_timeout: Duration::from_secs(15),
            history_timeout: Duration::from_secs(15),
        }
    }
}

impl PlatformConfig {
    pub fn stream_key_parser(&self) -> StreamKeyParser {
        StreamKeyParser::new(&self.host)
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn page_url(&self, stream_key: &str) -> String {
        format!("{}/{}", self.page_base_url.trim_end_matches('/'), stream_key)
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

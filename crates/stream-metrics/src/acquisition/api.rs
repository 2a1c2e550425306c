use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::{HttpSource, encode_path};
use super::error::AcquisitionError;
use super::{AcquisitionStrategy, Attempt, AttemptContext, RawRecord};
use crate::config::PlatformConfig;
use crate::stream_key::StreamKey;

/// Client for the platform's structured API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpSource,
    config: PlatformConfig,
}

impl ApiClient {
    pub fn new(http: HttpSource, config: PlatformConfig) -> Self {
        Self { http, config }
    }

    /// Health check against the status endpoint. Any failure means unavailable.
    pub async fn is_available(&self) -> bool {
        let url = self.config.api_url("status");
        match self.http.get_ok(&url, self.config.status_timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "API status check failed");
                false
            }
        }
    }

    /// Current stats of one stream as returned by the API.
    pub async fn fetch_stats(&self, stream_key: &StreamKey) -> Result<Value, AcquisitionError> {
        let url = self
            .config
            .api_url(&format!("streams/{}/stats", encode_path(stream_key.as_str())));
        let response = self.http.get_ok(&url, self.config.stats_timeout).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Historical readings of a stream, optionally bounded in time.
    ///
    /// Returns the rows of the response's `data` array. Failures are logged and
    /// produce an empty list.
    pub async fn fetch_history(
        &self,
        stream_key: &StreamKey,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Value> {
        match self.try_fetch_history(stream_key, start, end).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(stream_key = %stream_key, error = %e, "Failed to fetch historical data");
                Vec::new()
            }
        }
    }

    async fn try_fetch_history(
        &self,
        stream_key: &StreamKey,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, AcquisitionError> {
        let url = self
            .config
            .api_url(&format!("streams/{}/history", encode_path(stream_key.as_str())));

        let mut params = vec![("stream_id", stream_key.as_str().to_string())];
        if let Some(start) = start {
            params.push(("start_time", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(end) = end {
            params.push(("end_time", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let response = self
            .http
            .get(&url)
            .query(&params)
            .timeout(self.config.history_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let mut body: Value = serde_json::from_str(&response.text().await?)?;
        match body.get_mut("data").map(Value::take) {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }
}

/// First source of the chain: the structured stats endpoint, tried only after
/// a successful health check.
pub struct ApiStrategy {
    api: Arc<ApiClient>,
}

impl ApiStrategy {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AcquisitionStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt, AcquisitionError> {
        if !self.api.is_available().await {
            return Err(AcquisitionError::ApiUnavailable);
        }

        let body = self.api.fetch_stats(ctx.stream_key()).await?;
        if !body.is_object() {
            debug!(stream_key = %ctx.stream_key(), "API stats body is not an object");
            return Ok(Attempt::Miss);
        }
        Ok(Attempt::Complete(RawRecord::Json(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::client::test_client;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_for(server: &MockServer) -> Arc<ApiClient> {
        let config = PlatformConfig {
            api_base_url: format!("{}/v1", server.uri()),
            ..Default::default()
        };
        Arc::new(ApiClient::new(HttpSource::new(test_client()), config))
    }

    #[tokio::test]
    async fn test_stats_after_successful_status_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let body = json!({"broadcaster": {"name": "Alice"}, "stats": {"likes": 5}});
        Mock::given(method("GET"))
            .and(path("/v1/streams/alice/s1/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let strategy = ApiStrategy::new(api_for(&server).await);
        let key = StreamKey::from("alice/s1");
        let ctx = AttemptContext::with_page(&key, None);

        let attempt = strategy.attempt(&ctx).await.unwrap();
        assert_eq!(attempt, Attempt::Complete(RawRecord::Json(body)));
    }

    #[tokio::test]
    async fn test_stats_not_requested_when_status_check_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/streams/alice/s1/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let strategy = ApiStrategy::new(api_for(&server).await);
        let key = StreamKey::from("alice/s1");
        let ctx = AttemptContext::with_page(&key, None);

        let err = strategy.attempt(&ctx).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_stats_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/streams/alice/s1/stats"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let strategy = ApiStrategy::new(api_for(&server).await);
        let key = StreamKey::from("alice/s1");
        let ctx = AttemptContext::with_page(&key, None);

        let err = strategy.attempt(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::UnexpectedStatus { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/streams/alice/s1/history"))
            .and(query_param("stream_id", "alice/s1"))
            .and(query_param("start_time", "2024-05-01T10:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"likes": 1}, {"likes": 2}]
            })))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let start = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let rows = api
            .fetch_history(&StreamKey::from("alice/s1"), Some(start), None)
            .await;
        assert_eq!(rows, vec![json!({"likes": 1}), json!({"likes": 2})]);
    }

    #[tokio::test]
    async fn test_fetch_history_failure_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/streams/alice/s1/history"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let rows = api
            .fetch_history(&StreamKey::from("alice/s1"), None, None)
            .await;
        assert!(rows.is_empty());
    }
}

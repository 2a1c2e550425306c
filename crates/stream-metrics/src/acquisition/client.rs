use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use std::sync::Arc;
use std::time::Duration;

use super::error::AcquisitionError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Builds the shared HTTP client with the platform certificate verifier.
pub fn default_client() -> Result<Client, AcquisitionError> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_platform_verifier()?
        .with_no_client_auth();

    Ok(Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// HTTP access with browser-like default headers.
///
/// Every request carries a desktop `User-Agent` plus matching `Accept` headers so
/// stream pages are not rejected as obvious bot traffic.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    headers: HeaderMap,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_UA),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.8,ar;q=0.5"),
        );
        // Reqwest adds `Accept-Encoding` itself when the decompression features are on.

        Self { client, headers }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).headers(self.headers.clone())
    }

    /// Sends a GET bounded by `timeout` and rejects non-2xx responses.
    pub async fn get_ok(&self, url: &str, timeout: Duration) -> Result<Response, AcquisitionError> {
        let response = self.get(url).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// Percent-encodes each `/`-separated segment of a stream key for use in a URL path.
pub(crate) fn encode_path(stream_key: &str) -> String {
    stream_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Client for tests against plain-http mock servers.
#[cfg(test)]
pub(crate) fn test_client() -> Client {
    let _ = aws_lc_rs::default_provider().install_default();
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_encode_path_keeps_segments() {
        assert_eq!(encode_path("alice/stream42"), "alice/stream42");
        assert_eq!(encode_path("a b/c?d"), "a%20b/c%3Fd");
    }

    #[tokio::test]
    async fn test_get_ok_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/s1"))
            .and(header("user-agent", DEFAULT_UA))
            .and(header("accept-language", "en-US,en;q=0.8,ar;q=0.5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpSource::new(test_client());
        let url = format!("{}/alice/s1", server.uri());
        let response = source.get_ok(&url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_get_ok_rejects_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpSource::new(test_client());
        let url = format!("{}/missing", server.uri());
        let err = source.get_ok(&url, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::UnexpectedStatus { status: 404, .. }));
    }
}

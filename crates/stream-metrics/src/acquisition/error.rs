use thiserror::Error;

/// Failures of a single acquisition source.
///
/// None of these reach the caller of [`AcquisitionChain::acquire`](super::AcquisitionChain::acquire):
/// the chain logs them and moves on to the next source.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("tls error: {0}")]
    TlsError(#[from] rustls::Error),
    #[error("api unavailable")]
    ApiUnavailable,
    #[error("no embedded state payload in page")]
    MissingPayload,
}

impl AcquisitionError {
    /// Whether the error means the source could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::UnexpectedStatus { .. } | Self::ApiUnavailable
        )
    }
}

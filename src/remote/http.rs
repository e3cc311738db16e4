//! `reqwest`-backed asset downloads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};

use super::{AssetFetcher, RemoteError, RemoteResult};

/// Downloads icons, emoji and attachments over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Unknown(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64);
            return Err(classify_status(status, url, retry_after));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Unknown(e.to_string()))?;
        tracing::debug!(url, size = bytes.len(), "asset downloaded");
        Ok(bytes.to_vec())
    }
}

fn classify_status(status: StatusCode, url: &str, retry_after: Option<Duration>) -> RemoteError {
    match status {
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            RemoteError::PermissionDenied(format!("{status} fetching {url}"))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::NotFound(url.to_string()),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited { retry_after },
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            RemoteError::Validation(format!("{status} fetching {url}"))
        }
        _ => RemoteError::Unknown(format!("{status} fetching {url}")),
    }
}

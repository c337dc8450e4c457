use std::time::Duration;

use futures_util::StreamExt;
use mux_core::{FetchResult, RequestId};
use mux_logging::mux_debug;

use crate::{FailureKind, FetchError, FetchSettings};

/// One bounded-time retrieval of one URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the whole body as text. `timeout` of `None` means unbounded.
    async fn fetch(
        &self,
        rid: RequestId,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<FetchResult, FetchError>;
}

/// `Fetcher` over a shared, pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, settings })
    }

    fn too_large(&self, url: &str, actual: u64) -> FetchError {
        FetchError::new(
            url,
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        rid: RequestId,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<FetchResult, FetchError> {
        mux_debug!("[{}] fetching {}", rid, url);
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(url, FailureKind::InvalidUrl, err.to_string()))?;

        let mut request = self.client.get(parsed);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err))?;

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(url, content_len));
            }
        }

        // Upstream status is not inspected; the body is returned as-is.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(url, err))?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(url, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        mux_debug!("[{}] fetched {} ({} bytes)", rid, url, bytes.len());

        Ok(FetchResult {
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_builder() {
        FailureKind::InvalidUrl
    } else if err.is_body() || err.is_decode() {
        FailureKind::Body
    } else {
        FailureKind::Network
    };
    FetchError::new(url, kind, err.to_string())
}

//! Playlist source resolution.
//!
//! Decides where an account's playlist text comes from and fetches it:
//! the assigned stored document's inline text, else that document's URL,
//! else the account's own URL. A configured source that fails to fetch is
//! reported as such and never falls through to the next source.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use url::Url;

use crate::config::FetchLimits;
use crate::models::{AccountRecord, StoredPlaylistDocument};

/// Failure to obtain playlist text.
///
/// Clone so a single load outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Account has neither a stored playlist nor a URL
    #[error("no playlist source configured")]
    NoSource,
    /// Network, status, timeout or size-limit failure on a configured source
    #[error("playlist fetch failed: {0}")]
    FetchFailed(String),
}

/// Lookup of stored playlist documents by id
pub trait DocumentStore: Send + Sync {
    fn find_document(&self, id: &str) -> Option<Arc<StoredPlaylistDocument>>;
}

/// Anything that can produce raw playlist text for an account
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn resolve(&self, account: &AccountRecord) -> Result<String, FetchError>;
}

/// Resolves playlist text from stored documents or remote URLs
pub struct SourceResolver {
    client: Client,
    documents: Arc<dyn DocumentStore>,
    limits: FetchLimits,
}

impl SourceResolver {
    pub fn new(documents: Arc<dyn DocumentStore>, limits: FetchLimits) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(&limits.user_agent)
            .timeout(limits.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            documents,
            limits,
        })
    }

    /// Fetch a remote playlist under the configured timeout and size cap
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = Url::parse(url)
            .map_err(|e| FetchError::FetchFailed(format!("invalid playlist URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::FetchFailed(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let response = self.send_with_retry(url.as_str()).await?;
        self.read_body(response).await
    }

    /// Retries the same URL on network errors and 429, with exponential backoff
    async fn send_with_retry(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0u32;

        loop {
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.limits.max_retries {
                        let backoff_ms = backoff_ms(attempt);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "429", "backoff_ms" = backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(FetchError::FetchFailed(format!("HTTP {}", status)));
                }
                Err(err) => {
                    if !err.is_timeout() && attempt < self.limits.max_retries {
                        let backoff_ms = backoff_ms(attempt);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "network", "backoff_ms" = backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt += 1;
                        continue;
                    }

                    let reason = if err.is_timeout() {
                        format!("timed out after {}ms", self.limits.timeout.as_millis())
                    } else {
                        err.to_string()
                    };
                    return Err(FetchError::FetchFailed(reason));
                }
            }
        }
    }

    /// Read the body, refusing anything past `max_bytes`
    async fn read_body(&self, response: Response) -> Result<String, FetchError> {
        let max_bytes = self.limits.max_bytes;

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(too_large(max_bytes));
            }
            tracing::info!("Playlist size: {:.2} MB", len as f64 / 1024.0 / 1024.0);
        }

        let bytes_stream = response.bytes_stream().map(|result| {
            result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        });
        let mut reader = Box::pin(StreamReader::new(bytes_stream)).take(max_bytes + 1);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.map_err(|e| {
            FetchError::FetchFailed(format!("failed to read playlist body: {}", e))
        })?;

        if body.len() as u64 > max_bytes {
            return Err(too_large(max_bytes));
        }

        Ok(match String::from_utf8(body) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

#[async_trait]
impl PlaylistSource for SourceResolver {
    async fn resolve(&self, account: &AccountRecord) -> Result<String, FetchError> {
        if let Some(ref playlist_id) = account.playlist_id {
            match self.documents.find_document(playlist_id) {
                Some(doc) => {
                    if let Some(content) = doc.content.as_deref().filter(|c| !c.is_empty()) {
                        tracing::debug!(playlist_id = %playlist_id, chars = content.len(), "using stored playlist content");
                        return Ok(content.to_string());
                    }
                    if let Some(url) = doc.url.as_deref().filter(|u| !u.is_empty()) {
                        tracing::info!(playlist_id = %playlist_id, "fetching stored playlist URL");
                        return self.fetch(url).await;
                    }
                }
                None => {
                    tracing::warn!(playlist_id = %playlist_id, account = %account.username, "assigned playlist not found");
                }
            }
        }

        if let Some(url) = account.playlist_url.as_deref().filter(|u| !u.is_empty()) {
            tracing::info!(account = %account.username, "fetching account playlist URL");
            return self.fetch(url).await;
        }

        Err(FetchError::NoSource)
    }
}

fn backoff_ms(attempt: u32) -> u64 {
    (1u64 << attempt.min(16)).saturating_mul(500).min(10_000)
}

fn too_large(max_bytes: u64) -> FetchError {
    FetchError::FetchFailed(format!(
        "playlist exceeds size limit of {}MB",
        max_bytes / 1024 / 1024
    ))
}

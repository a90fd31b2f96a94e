//! HTTP transport with retry logic and atomic file writes.
//!
//! Key features:
//! - Bearer authentication when a token is configured
//! - Exponential backoff retry on HTTP 503 and connection failures
//! - Streaming downloads into a `.partial` file, renamed on completion
//! - In-memory caching of catalog pages

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::{ArchiveConfig, RetryPolicy};
use crate::error::{ArchiveError, ArchiveResult};
use crate::listing_cache::ListingCache;

/// Access to remote archive pages and files.
#[async_trait]
pub trait ArchiveTransport: Send + Sync {
    /// Fetch a page as text.
    async fn get_text(&self, url: &str) -> ArchiveResult<String>;

    /// Download `url` to `dest`, returning the number of bytes written.
    ///
    /// `dest` only appears once the transfer has completed.
    async fn download_to(&self, url: &str, dest: &Path) -> ArchiveResult<u64>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
    retry: RetryPolicy,
    listings: ListingCache,
}

impl HttpTransport {
    /// Create a transport. `token` is sent as a bearer credential when set.
    pub fn new(config: &ArchiveConfig, token: Option<String>) -> ArchiveResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ArchiveError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token,
            retry: config.retry.clone(),
            listings: ListingCache::new(config.listing_ttl),
        })
    }

    /// Send a GET, retrying 503 responses and connection failures.
    async fn get_with_retry(&self, url: &str) -> ArchiveResult<Response> {
        let mut attempt = 0;

        loop {
            let mut request = self.client.get(url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let retryable = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == StatusCode::SERVICE_UNAVAILABLE => {
                    ArchiveError::Http {
                        status: 503,
                        url: url.to_string(),
                    }
                }
                Ok(response) => {
                    return Err(ArchiveError::Http {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    })
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    ArchiveError::Transport(e.to_string())
                }
                Err(e) => return Err(ArchiveError::Transport(e.to_string())),
            };

            if attempt >= self.retry.max_retries {
                return Err(retryable);
            }

            let delay = self.retry.delay(attempt);
            warn!(
                url = %url,
                error = %retryable,
                retry = attempt + 1,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Stream response body to file.
    async fn stream_to_file(response: Response, path: &Path) -> ArchiveResult<u64> {
        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ArchiveError::Transport(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl ArchiveTransport for HttpTransport {
    async fn get_text(&self, url: &str) -> ArchiveResult<String> {
        if let Some(body) = self.listings.get(url).await {
            return Ok(body);
        }

        let response = self.get_with_retry(url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ArchiveError::Transport(e.to_string()))?;

        self.listings.set(url, body.clone()).await;
        Ok(body)
    }

    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    async fn download_to(&self, url: &str, dest: &Path) -> ArchiveResult<u64> {
        let started = Instant::now();
        let temp_path = partial_path(dest);

        let response = self.get_with_retry(url).await?;
        let expected = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let written = match Self::stream_to_file(response, &temp_path).await {
            Ok(written) => written,
            Err(e) => {
                fs::remove_file(&temp_path).await.ok();
                return Err(e);
            }
        };

        if let Some(expected) = expected {
            if written != expected {
                fs::remove_file(&temp_path).await.ok();
                return Err(ArchiveError::Transport(format!(
                    "Download size mismatch: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }

        fs::rename(&temp_path, dest).await?;
        debug!(from = %temp_path.display(), "Renamed partial download");

        info!(
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Download completed"
        );
        Ok(written)
    }
}

/// Temporary path a download is written to before the final rename.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        let dest = Path::new("/data/oco2_LtSIF_191201.nc4");
        assert_eq!(
            partial_path(dest),
            PathBuf::from("/data/oco2_LtSIF_191201.nc4.partial")
        );
    }
}

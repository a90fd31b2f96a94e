//! Upstream tile provider client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;

use sif_common::{SifError, SifResult};

use crate::config::USER_AGENT;

/// Media type of vector tiles.
pub const TILE_CONTENT_TYPE: &str = "application/x-protobuf";

/// Status line and body of an upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches tiles from the upstream provider.
///
/// Any HTTP response, including non-2xx, is `Ok`. `Err` means the request
/// never produced a response.
#[async_trait]
pub trait TileUpstream: Send + Sync {
    async fn fetch(&self, url: &str) -> SifResult<UpstreamResponse>;
}

/// `reqwest`-backed upstream client.
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(timeout: Duration) -> SifResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(TILE_CONTENT_TYPE));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SifError::InternalError(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TileUpstream for ReqwestUpstream {
    async fn fetch(&self, url: &str) -> SifResult<UpstreamResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SifError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SifError::Transport(e.without_url().to_string()))?;

        Ok(UpstreamResponse {
            status: status.as_u16(),
            status_text: status_text(status.canonical_reason(), &body),
            body,
        })
    }
}

/// Longest slice of an upstream body used as a status text.
const MAX_STATUS_TEXT: usize = 200;

/// Reason phrase for a status, falling back to the first line of the body
/// for non-standard codes. Never empty.
pub fn status_text(reason: Option<&str>, body: &[u8]) -> String {
    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
        return reason.to_string();
    }
    let text = String::from_utf8_lossy(body);
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.is_empty() {
        return "Unknown".to_string();
    }
    line.chars().take(MAX_STATUS_TEXT).collect()
}

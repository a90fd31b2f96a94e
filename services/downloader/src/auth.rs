//! NASA Earthdata Login credentials.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use tracing::info;

use crate::error::{ArchiveError, ArchiveResult};

/// Endpoint exchanging a username/password for a bearer token.
pub const TOKEN_URL: &str = "https://urs.earthdata.nasa.gov/api/users/find_or_create_token";

/// How the downloader authenticates against the archive.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Pre-issued bearer token.
    Token(String),
    /// Earthdata Login account, exchanged for a token on startup.
    Login { username: String, password: String },
    /// No credentials; only public endpoints will work.
    Anonymous,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => write!(f, "Token(..)"),
            Credentials::Login { username, .. } => write!(f, "Login({})", username),
            Credentials::Anonymous => write!(f, "Anonymous"),
        }
    }
}

impl Credentials {
    /// Pick credentials from the optional sources. A token wins over a login.
    pub fn from_parts(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (non_empty(token), non_empty(username), non_empty(password)) {
            (Some(token), _, _) => Credentials::Token(token),
            (None, Some(username), Some(password)) => Credentials::Login { username, password },
            _ => Credentials::Anonymous,
        }
    }

    /// Resolve to a bearer token, contacting Earthdata Login if needed.
    pub async fn resolve(&self, token_url: &str) -> ArchiveResult<Option<String>> {
        match self {
            Credentials::Token(token) => Ok(Some(token.clone())),
            Credentials::Login { username, password } => {
                request_token(token_url, username, password).await.map(Some)
            }
            Credentials::Anonymous => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange a username/password for an access token.
pub async fn request_token(token_url: &str, username: &str, password: &str) -> ArchiveResult<String> {
    let client = Client::builder()
        .user_agent("earthaccess")
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ArchiveError::Auth(e.to_string()))?;

    let response = client
        .post(token_url)
        .basic_auth(username, Some(password))
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ArchiveError::Auth(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ArchiveError::Auth(e.to_string()))?;

    if !status.is_success() {
        return Err(ArchiveError::Auth(format!("HTTP {}: {}", status.as_u16(), body.trim())));
    }

    let token = extract_access_token(&body)?;
    info!(username = %username, "Obtained Earthdata token");
    Ok(token)
}

/// Pull `access_token` out of a token endpoint response.
pub fn extract_access_token(body: &str) -> ArchiveResult<String> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| ArchiveError::Auth(format!("unexpected token response: {}", e)))?;
    parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ArchiveError::Auth("no access_token in token response".to_string()))
}

//! Proxy configuration.

use std::time::Duration;

use sif_common::{SifError, SifResult, TileCoord, TileUrlTemplate};
use url::Url;

/// Upstream vector tile template used when none is configured.
pub const DEFAULT_UPSTREAM_TEMPLATE: &str = "https://api.maptiler.com/tiles/v3/{z}/{x}/{y}.pbf";

/// Query parameter carrying the upstream credential.
pub const DEFAULT_KEY_PARAM: &str = "key";

/// Cache lifetime of a stored tile, and the `max-age` advertised to clients.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Sent on every upstream request.
pub const USER_AGENT: &str = concat!("sif-tile-proxy/", env!("CARGO_PKG_VERSION"));

/// Runtime configuration of the tile proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Server-side credential appended to upstream requests. `None` means
    /// every tile request fails with a configuration error.
    pub api_key: Option<String>,
    pub upstream: TileUrlTemplate,
    pub key_param: String,
    pub ttl: Duration,
}

impl ProxyConfig {
    pub fn new(api_key: Option<String>, upstream: TileUrlTemplate) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            upstream,
            key_param: DEFAULT_KEY_PARAM.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    pub fn with_key_param(mut self, key_param: impl Into<String>) -> Self {
        self.key_param = key_param.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache key for a tile: the upstream URL without the credential.
    pub fn cache_key(&self, coord: &TileCoord) -> String {
        self.upstream.expand(coord)
    }

    /// Full upstream URL for a tile, credential included.
    pub fn upstream_url(&self, coord: &TileCoord, api_key: &str) -> SifResult<String> {
        let mut url = Url::parse(&self.cache_key(coord)).map_err(|e| {
            SifError::InternalError(format!("invalid upstream URL template: {}", e))
        })?;
        url.query_pairs_mut().append_pair(&self.key_param, api_key);
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> ProxyConfig {
        ProxyConfig::new(
            key.map(str::to_string),
            TileUrlTemplate::new("https://tiles.example.com/v3/{z}/{x}/{y}.pbf").unwrap(),
        )
    }

    #[test]
    fn test_cache_key_excludes_credential() {
        let coord = TileCoord::new(3, 2, 1);
        let a = config(Some("secret-a"));
        let b = config(Some("secret-b"));

        assert_eq!(a.cache_key(&coord), b.cache_key(&coord));
        assert!(!a.cache_key(&coord).contains("secret"));
    }

    #[test]
    fn test_upstream_url_appends_key() {
        let coord = TileCoord::new(3, 2, 1);
        let cfg = config(Some("abc123"));
        let url = cfg.upstream_url(&coord, "abc123").unwrap();
        assert_eq!(url, "https://tiles.example.com/v3/3/2/1.pbf?key=abc123");

        let cfg = cfg.with_key_param("access_token");
        let url = cfg.upstream_url(&coord, "abc123").unwrap();
        assert!(url.ends_with("?access_token=abc123"));
    }

    #[test]
    fn test_blank_key_is_missing() {
        assert!(config(Some("   ")).api_key.is_none());
        assert!(config(None).api_key.is_none());
    }
}

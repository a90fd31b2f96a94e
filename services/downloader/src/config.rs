//! Archive endpoints and download tuning.

use std::time::Duration;

use url::Url;

use crate::error::ArchiveResult;

/// OpenDAP portal hosting both OCO-2 and OCO-3 datasets.
pub const DEFAULT_OPENDAP_URL: &str = "https://oco2.gesdisc.eosdis.nasa.gov/opendap/";

/// Direct data portal used for granule downloads.
pub const DEFAULT_DATA_URL: &str = "https://oco2.gesdisc.eosdis.nasa.gov/data/";

/// UNH global ecology data store serving GOSIF.
pub const DEFAULT_GOSIF_URL: &str = "https://data.globalecology.unh.edu/data/";

/// Concurrent downloads when running in parallel.
pub const MAX_PARALLEL_DOWNLOADS: usize = 3;

/// Retry behaviour for HTTP 503 responses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Configuration for the archive transport and client.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub opendap_url: Url,
    pub data_url: Url,
    pub retry: RetryPolicy,
    /// How long directory listings are served from memory.
    pub listing_ttl: Duration,
    pub request_timeout: Duration,
    pub max_parallel: usize,
}

impl ArchiveConfig {
    pub fn new(opendap_url: &str, data_url: &str) -> ArchiveResult<Self> {
        Ok(Self {
            opendap_url: directory_url(opendap_url)?,
            data_url: directory_url(data_url)?,
            retry: RetryPolicy::default(),
            listing_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(600),
            max_parallel: MAX_PARALLEL_DOWNLOADS,
        })
    }
}

/// Parse a base URL, making sure it ends in `/` so joins append to it.
pub fn directory_url(raw: &str) -> ArchiveResult<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(16));
    }

    #[test]
    fn test_directory_url_gets_trailing_slash() {
        let url = directory_url("https://example.com/opendap").unwrap();
        assert_eq!(url.as_str(), "https://example.com/opendap/");
        assert_eq!(url.join("a/b").unwrap().as_str(), "https://example.com/opendap/a/b");
    }

    #[test]
    fn test_default_config() {
        let config = ArchiveConfig::new(DEFAULT_OPENDAP_URL, DEFAULT_DATA_URL).unwrap();
        assert_eq!(config.opendap_url.as_str(), DEFAULT_OPENDAP_URL);
        assert_eq!(config.max_parallel, 3);
        assert_eq!(config.listing_ttl, Duration::from_secs(300));
    }
}

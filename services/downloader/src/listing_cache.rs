//! Directory listing caching.
//!
//! Catalog pages change rarely, and one time-range request can list the same
//! year directory several times. Pages are kept in memory for a fixed TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CachedPage {
    body: String,
    fetched_at: Instant,
}

/// TTL cache of catalog pages keyed by URL.
pub struct ListingCache {
    pages: RwLock<HashMap<String, CachedPage>>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached page body if still fresh.
    pub async fn get(&self, url: &str) -> Option<String> {
        let guard = self.pages.read().await;
        let cached = guard.get(url)?;
        if cached.fetched_at.elapsed() < self.ttl {
            debug!(url = %url, "Listing cache hit");
            return Some(cached.body.clone());
        }
        debug!(url = %url, "Listing cache expired");
        None
    }

    pub async fn set(&self, url: &str, body: String) {
        let mut guard = self.pages.write().await;
        guard.retain(|_, page| page.fetched_at.elapsed() < self.ttl);
        guard.insert(
            url.to_string(),
            CachedPage {
                body,
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self) {
        self.pages.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_page_is_served() {
        let cache = ListingCache::new(Duration::from_secs(300));
        assert!(cache.get("https://h/a").await.is_none());

        cache.set("https://h/a", "<html/>".to_string()).await;
        assert_eq!(cache.get("https://h/a").await.as_deref(), Some("<html/>"));

        cache.invalidate().await;
        assert!(cache.get("https://h/a").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_serves() {
        let cache = ListingCache::new(Duration::ZERO);
        cache.set("https://h/a", "x".to_string()).await;
        assert!(cache.get("https://h/a").await.is_none());
    }
}

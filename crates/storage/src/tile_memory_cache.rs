//! In-process tile store.
//!
//! Entries expire lazily: an expired tile is dropped the next time it is
//! read, or when `purge_expired` sweeps the map. There is no size-based
//! eviction.
//!
//! ## Metrics
//!
//! The store tracks counters for the admin endpoint:
//! - `hits`/`misses`: lookup outcomes
//! - `expired`: entries dropped because their TTL elapsed
//! - `entries`: current number of stored tiles

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use sif_common::SifResult;

use crate::cache::{CachedTile, TileStore};

struct Entry {
    tile: CachedTile,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Counters for the memory store.
///
/// All fields are atomic for lock-free reads from metrics endpoints.
#[derive(Default)]
pub struct MemoryTileStoreStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
    pub entries: AtomicU64,
}

impl MemoryTileStoreStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

/// Tile store held in a `HashMap` behind a tokio `RwLock`.
#[derive(Clone, Default)]
pub struct MemoryTileStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    stats: Arc<MemoryTileStoreStats>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<MemoryTileStoreStats> {
        self.stats.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();

        self.stats
            .expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        self.stats
            .entries
            .store(entries.len() as u64, Ordering::Relaxed);

        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Purged expired tiles");
        }
        removed
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn get(&self, key: &str) -> SifResult<Option<CachedTile>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.tile.clone()));
                }
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                Some(_) => {}
            }
        }

        // Expired: upgrade to a write lock and drop it, unless a writer
        // replaced it in the meantime.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.tile.clone()));
            }
            entries.remove(key);
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            self.stats
                .entries
                .store(entries.len() as u64, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn put(&self, key: &str, tile: CachedTile, ttl: Duration) -> SifResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                tile,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        self.stats
            .entries
            .store(entries.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

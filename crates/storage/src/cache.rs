//! Tile store abstraction and the Redis-backed implementation.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use sif_common::{SifError, SifResult};

/// A cached tile payload with the metadata needed to answer a cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    pub data: Bytes,
    pub content_type: String,
    pub stored_at: DateTime<Utc>,
}

impl CachedTile {
    pub fn new(data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            stored_at: Utc::now(),
        }
    }

    /// Seconds elapsed since the tile was stored, never negative.
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.stored_at).num_seconds().max(0) as u64
    }
}

/// Key-value capability the proxy caches tiles in.
///
/// Eviction beyond TTL expiry is the store's own business.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Look up a tile. Expired entries are reported as missing.
    async fn get(&self, key: &str) -> SifResult<Option<CachedTile>>;

    /// Store a tile, replacing any previous entry for the key.
    async fn put(&self, key: &str, tile: CachedTile, ttl: Duration) -> SifResult<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

const FIELD_DATA: &str = "data";
const FIELD_CONTENT_TYPE: &str = "content_type";
const FIELD_STORED_AT: &str = "stored_at";

/// Redis tile store. Each tile is a hash with an `EXPIRE` equal to its TTL.
#[derive(Clone)]
pub struct RedisTileStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisTileStore {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> SifResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| SifError::CacheError(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SifError::CacheError(format!("Redis connection failed: {}", e)))?;

        Ok(Self {
            conn,
            prefix: "tile:".to_string(),
        })
    }

    /// Namespace every key with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl TileStore for RedisTileStore {
    async fn get(&self, key: &str) -> SifResult<Option<CachedTile>> {
        let mut conn = self.conn.clone();
        let redis_key = self.redis_key(key);

        let mut fields: HashMap<String, Vec<u8>> = conn
            .hgetall(&redis_key)
            .await
            .map_err(|e| SifError::CacheError(format!("Cache get failed: {}", e)))?;

        let Some(data) = fields.remove(FIELD_DATA) else {
            return Ok(None);
        };

        let content_type = fields
            .remove(FIELD_CONTENT_TYPE)
            .and_then(|v| String::from_utf8(v).ok())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let stored_at = fields
            .remove(FIELD_STORED_AT)
            .and_then(|v| String::from_utf8(v).ok())
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(Some(CachedTile {
            data: Bytes::from(data),
            content_type,
            stored_at,
        }))
    }

    async fn put(&self, key: &str, tile: CachedTile, ttl: Duration) -> SifResult<()> {
        let mut conn = self.conn.clone();
        let redis_key = self.redis_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&redis_key)
            .arg(FIELD_DATA)
            .arg(tile.data.as_ref())
            .arg(FIELD_CONTENT_TYPE)
            .arg(&tile.content_type)
            .arg(FIELD_STORED_AT)
            .arg(tile.stored_at.timestamp())
            .ignore()
            .cmd("EXPIRE")
            .arg(&redis_key)
            .arg(ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SifError::CacheError(format!("Cache set failed: {}", e)))?;

        debug!(key = %redis_key, bytes = tile.data.len(), ttl_secs, "Stored tile in Redis");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_is_never_negative() {
        let tile = CachedTile::new(Bytes::from_static(b"tile"), "application/x-protobuf");
        let earlier = tile.stored_at - chrono::Duration::seconds(30);
        assert_eq!(tile.age_secs(earlier), 0);

        let later = tile.stored_at + chrono::Duration::seconds(42);
        assert_eq!(tile.age_secs(later), 42);
    }
}

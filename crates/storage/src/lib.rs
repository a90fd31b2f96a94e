//! Storage abstractions for the tile proxy.
//!
//! Provides a single injected key-value capability (`TileStore`) with:
//! - An in-process store with lazy TTL expiry (default, and for tests)
//! - Redis for a store shared across proxy instances

pub mod cache;
pub mod tile_memory_cache;

pub use cache::{CachedTile, RedisTileStore, TileStore};
pub use tile_memory_cache::{MemoryTileStore, MemoryTileStoreStats};

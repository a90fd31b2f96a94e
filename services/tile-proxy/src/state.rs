//! Application state and shared resources.

use std::sync::Arc;

use storage::{MemoryTileStoreStats, TileStore};

use crate::config::ProxyConfig;
use crate::metrics::MetricsCollector;
use crate::upstream::TileUpstream;

/// Shared application state.
pub struct AppState {
    pub config: ProxyConfig,
    pub store: Arc<dyn TileStore>,
    pub upstream: Arc<dyn TileUpstream>,
    pub metrics: Arc<MetricsCollector>,
    /// Present when the store is the in-process one.
    pub memory_stats: Option<Arc<MemoryTileStoreStats>>,
}

impl AppState {
    pub fn new(
        config: ProxyConfig,
        store: Arc<dyn TileStore>,
        upstream: Arc<dyn TileUpstream>,
    ) -> Self {
        Self {
            config,
            store,
            upstream,
            metrics: Arc::new(MetricsCollector::new()),
            memory_stats: None,
        }
    }

    pub fn with_memory_stats(mut self, stats: Arc<MemoryTileStoreStats>) -> Self {
        self.memory_stats = Some(stats);
        self
    }
}

//! Proxy metrics collection and reporting.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use storage::MemoryTileStoreStats;

/// Metrics collector for the tile proxy.
#[derive(Debug)]
pub struct MetricsCollector {
    pub requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_read_errors: AtomicU64,
    pub cache_writes: AtomicU64,
    pub cache_write_failures: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub transport_errors: AtomicU64,

    start_time: Instant,
}

/// Point-in-time view of the counters, served on `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache_read_errors: u64,
    pub cache_writes: u64,
    pub cache_write_failures: u64,
    pub upstream_errors: u64,
    pub transport_errors: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_read_errors: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            upstream_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("tile_requests_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_misses_total").increment(1);
    }

    /// A store lookup failed and was served as a miss.
    pub fn record_cache_read_error(&self) {
        self.cache_read_errors.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_read_errors_total").increment(1);
    }

    pub fn record_cache_write(&self, success: bool) {
        if success {
            self.cache_writes.fetch_add(1, Ordering::Relaxed);
            counter!("tile_cache_writes_total").increment(1);
        } else {
            self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
            counter!("tile_cache_write_failures_total").increment(1);
        }
    }

    /// Upstream answered with a non-2xx status.
    pub fn record_upstream_error(&self, status: u16) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
        counter!("tile_upstream_errors_total", "status" => status.to_string()).increment(1);
    }

    /// Upstream request failed without a response.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        counter!("tile_upstream_transport_errors_total").increment(1);
    }

    pub fn record_upstream_fetch(&self, duration_us: u64, bytes: usize) {
        histogram!("tile_upstream_fetch_duration_ms").record(duration_us as f64 / 1000.0);
        counter!("tile_upstream_bytes_total").increment(bytes as u64);
    }

    /// Publish memory store statistics as gauges.
    pub fn record_memory_store_stats(&self, stats: &MemoryTileStoreStats) {
        gauge!("tile_memory_store_entries").set(stats.entry_count() as f64);
        gauge!("tile_memory_store_expired_total").set(stats.expired.load(Ordering::Relaxed) as f64);
        gauge!("tile_memory_store_hit_rate_percent").set(stats.hit_rate());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                (hits as f64 / lookups as f64) * 100.0
            },
            cache_read_errors: self.cache_read_errors.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

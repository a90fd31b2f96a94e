//! End-to-end tests for the tile proxy router with in-memory fakes for the
//! store and the upstream provider.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower::ServiceExt;

use sif_common::{SifError, SifResult, TileUrlTemplate};
use storage::{CachedTile, MemoryTileStore, TileStore};
use test_utils::generators::synthetic_tile;
use tile_proxy::{
    config::ProxyConfig,
    state::AppState,
    tile_router,
    upstream::{TileUpstream, UpstreamResponse},
};

const TEMPLATE: &str = "https://tiles.example.com/v3/{z}/{x}/{y}.pbf";

// ============================================================================
// Fakes
// ============================================================================

/// Upstream returning a fixed response and recording requested URLs.
struct FakeUpstream {
    status: u16,
    status_text: &'static str,
    fail: bool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeUpstream {
    fn ok() -> Self {
        Self::with_status(200, "OK")
    }

    fn with_status(status: u16, status_text: &'static str) -> Self {
        Self {
            status,
            status_text,
            fail: false,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileUpstream for FakeUpstream {
    async fn fetch(&self, url: &str) -> SifResult<UpstreamResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(SifError::Transport("connection refused".to_string()));
        }
        Ok(UpstreamResponse {
            status: self.status,
            status_text: self.status_text.to_string(),
            body: Bytes::from(synthetic_tile(url)),
        })
    }
}

/// Store recording every key it is asked about.
#[derive(Default)]
struct RecordingStore {
    tiles: Mutex<HashMap<String, CachedTile>>,
    get_keys: Mutex<Vec<String>>,
    puts: AtomicUsize,
    fail_reads: bool,
}

#[async_trait]
impl TileStore for RecordingStore {
    async fn get(&self, key: &str) -> SifResult<Option<CachedTile>> {
        self.get_keys.lock().unwrap().push(key.to_string());
        if self.fail_reads {
            return Err(SifError::CacheError("store offline".to_string()));
        }
        Ok(self.tiles.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, tile: CachedTile, _ttl: Duration) -> SifResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.tiles.lock().unwrap().insert(key.to_string(), tile);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "recording"
    }
}

/// Store whose writes stall, then fail.
struct StallingStore {
    delay: Duration,
    puts: AtomicUsize,
}

impl StallingStore {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TileStore for StallingStore {
    async fn get(&self, _key: &str) -> SifResult<Option<CachedTile>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _tile: CachedTile, _ttl: Duration) -> SifResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(SifError::CacheError("write timed out".to_string()))
    }

    fn backend(&self) -> &'static str {
        "stalling"
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn app(
    key: Option<&str>,
    store: Arc<dyn TileStore>,
    upstream: Arc<dyn TileUpstream>,
) -> (Router, Arc<AppState>) {
    let config = ProxyConfig::new(
        key.map(str::to_string),
        TileUrlTemplate::new(TEMPLATE).unwrap(),
    );
    let state = Arc::new(AppState::new(config, store, upstream));
    (tile_router(state.clone()), state)
}

async fn send(app: &Router, method: Method, path: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Assert a successful miss and hand the response back.
fn assert_miss(response: Response) -> Response {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    response
}

/// Wait for the background cache write to land.
async fn wait_for_puts(store: &RecordingStore, expected: usize) {
    for _ in 0..200 {
        if store.puts.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cache write did not happen");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_cache_key_is_independent_of_credential() {
    let store_a = Arc::new(RecordingStore::default());
    let store_b = Arc::new(RecordingStore::default());
    let (app_a, _) = app(Some("first-secret"), store_a.clone(), Arc::new(FakeUpstream::ok()));
    let (app_b, _) = app(Some("second-secret"), store_b.clone(), Arc::new(FakeUpstream::ok()));

    send(&app_a, Method::GET, "/4/3/2.pbf").await;
    send(&app_b, Method::GET, "/4/3/2.pbf").await;

    let keys_a = store_a.get_keys.lock().unwrap().clone();
    let keys_b = store_b.get_keys.lock().unwrap().clone();
    assert_eq!(keys_a, keys_b);
    assert_eq!(keys_a, vec!["https://tiles.example.com/v3/4/3/2.pbf".to_string()]);
    assert!(!keys_a[0].contains("secret"));
}

#[tokio::test]
async fn test_miss_then_hit() {
    let store = Arc::new(RecordingStore::default());
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, state) = app(Some("secret"), store.clone(), upstream.clone());

    let first = send(&app, Method::GET, "/tiles/3/2/1.pbf").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "x-cache"), Some("MISS"));
    assert_eq!(header(&first, "content-type"), Some("application/x-protobuf"));
    assert_eq!(header(&first, "access-control-allow-origin"), Some("*"));
    assert_eq!(header(&first, "cache-control"), Some("public, max-age=86400"));
    let first_body = body_bytes(first).await;

    wait_for_puts(&store, 1).await;

    let second = send(&app, Method::GET, "/tiles/3/2/1.pbf").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "x-cache"), Some("HIT"));
    assert_eq!(header(&second, "content-type"), Some("application/x-protobuf"));
    assert!(header(&second, "age").is_some());
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(upstream.calls(), 1);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);
}

#[tokio::test]
async fn test_warm_cache_is_idempotent() {
    let store = Arc::new(MemoryTileStore::new());
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(Some("secret"), store.clone(), upstream.clone());

    send(&app, Method::GET, "/7/10/20.pbf").await;
    for _ in 0..200 {
        if !store.is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let a = body_bytes(send(&app, Method::GET, "/7/10/20.pbf").await).await;
    let b = body_bytes(send(&app, Method::GET, "/7/10/20.pbf").await).await;
    assert_eq!(a, b);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_upstream_url_carries_credential() {
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(
        Some("secret"),
        Arc::new(RecordingStore::default()),
        upstream.clone(),
    );

    send(&app, Method::GET, "/3/2/1.pbf").await;

    let urls = upstream.urls.lock().unwrap().clone();
    assert_eq!(urls, vec!["https://tiles.example.com/v3/3/2/1.pbf?key=secret".to_string()]);
}

#[tokio::test]
async fn test_missing_credential_fails_before_upstream() {
    let store = Arc::new(RecordingStore::default());
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(None, store.clone(), upstream.clone());

    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(upstream.calls(), 0);
    assert!(store.get_keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_not_found_is_propagated_without_caching() {
    let store = Arc::new(RecordingStore::default());
    let upstream = Arc::new(FakeUpstream::with_status(404, "Not Found"));
    let (app, _) = app(Some("secret"), store.clone(), upstream.clone());

    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(body_bytes(response).await, Bytes::from_static(b"Not Found"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_is_500() {
    let store = Arc::new(RecordingStore::default());
    let (app, state) = app(Some("secret"), store.clone(), Arc::new(FakeUpstream::unreachable()));

    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).contains("connection refused"));
    assert_eq!(state.metrics.snapshot().transport_errors, 1);
}

#[tokio::test]
async fn test_store_read_failure_is_a_miss() {
    let store = Arc::new(RecordingStore {
        fail_reads: true,
        ..Default::default()
    });
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, state) = app(Some("secret"), store.clone(), upstream.clone());

    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    assert_eq!(upstream.calls(), 1);
    assert_eq!(state.metrics.snapshot().cache_read_errors, 1);
}

#[tokio::test]
async fn test_slow_failing_store_does_not_delay_response() {
    let store = Arc::new(StallingStore::new(Duration::from_secs(5)));
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, state) = app(Some("secret"), store.clone(), upstream.clone());

    let started = Instant::now();
    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    let body = body_bytes(assert_miss(response)).await;
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert!(!body.is_empty());

    // the write was started but has not finished
    for _ in 0..200 {
        if store.puts.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert_eq!(state.metrics.snapshot().cache_write_failures, 0);
}

#[tokio::test]
async fn test_failed_store_write_is_only_counted() {
    let store = Arc::new(StallingStore::new(Duration::ZERO));
    let (app, state) = app(Some("secret"), store.clone(), Arc::new(FakeUpstream::ok()));

    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    let body = body_bytes(assert_miss(response)).await;
    assert!(!body.is_empty());

    for _ in 0..200 {
        if state.metrics.snapshot().cache_write_failures == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.cache_write_failures, 1);
    assert_eq!(snapshot.cache_writes, 0);

    // the next request misses again and still succeeds
    let response = send(&app, Method::GET, "/3/2/1.pbf").await;
    assert_miss(response);
}

#[tokio::test]
async fn test_non_tile_path_is_400() {
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(
        Some("secret"),
        Arc::new(RecordingStore::default()),
        upstream.clone(),
    );

    for path in ["/abc/tiles", "/", "/3/2/1.png", "/3/x/1.pbf"] {
        let response = send(&app, Method::GET, path).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path {}", path);
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_preflight() {
    let store = Arc::new(RecordingStore::default());
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(None, store.clone(), upstream.clone());

    let response = send(&app, Method::OPTIONS, "/anything/at/all").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(header(&response, "access-control-allow-methods"), Some("GET, OPTIONS"));
    assert_eq!(header(&response, "access-control-allow-headers"), Some("*"));
    assert_eq!(header(&response, "access-control-max-age"), Some("86400"));
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_other_methods_are_405() {
    let upstream = Arc::new(FakeUpstream::ok());
    let (app, _) = app(
        Some("secret"),
        Arc::new(RecordingStore::default()),
        upstream.clone(),
    );

    for method in [Method::POST, Method::PUT, Method::DELETE] {
        let response = send(&app, method, "/3/2/1.pbf").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_admin_health() {
    let (_, state) = app(
        Some("secret"),
        Arc::new(RecordingStore::default()),
        Arc::new(FakeUpstream::ok()),
    );
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let admin = tile_proxy::admin_router(state, handle);

    let response = send(&admin, Method::GET, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "tile-proxy");
    assert_eq!(json["store"], "recording");
    assert_eq!(json["api_key_configured"], true);

    let response = send(&admin, Method::GET, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}

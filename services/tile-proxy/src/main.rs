//! Tile cache proxy service.

use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sif_common::TileUrlTemplate;
use storage::{MemoryTileStore, RedisTileStore, TileStore};
use tile_proxy::{
    admin_router,
    config::{ProxyConfig, DEFAULT_KEY_PARAM, DEFAULT_TTL_SECS, DEFAULT_UPSTREAM_TEMPLATE},
    state::AppState,
    tile_router,
    upstream::ReqwestUpstream,
};

#[derive(Parser, Debug)]
#[command(name = "tile-proxy")]
#[command(about = "Caching proxy for upstream vector map tiles")]
struct Args {
    /// Listen address for tile requests
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Port for /health and /metrics
    #[arg(long, env = "ADMIN_PORT", default_value = "9090")]
    admin_port: u16,

    /// Upstream API key, never exposed to clients
    #[arg(long, env = "TILE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream tile URL template with {z}, {x} and {y}
    #[arg(long, env = "UPSTREAM_TILE_URL", default_value = DEFAULT_UPSTREAM_TEMPLATE)]
    upstream_url: String,

    /// Query parameter name carrying the API key
    #[arg(long, env = "UPSTREAM_KEY_PARAM", default_value = DEFAULT_KEY_PARAM)]
    key_param: String,

    /// Cache TTL in seconds
    #[arg(long, env = "TILE_CACHE_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    cache_ttl_secs: u64,

    /// Redis URL; the in-process store is used when unset
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    upstream_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting tile proxy");

    let template = TileUrlTemplate::new(args.upstream_url.clone())
        .context("Invalid UPSTREAM_TILE_URL")?;
    let config = ProxyConfig::new(args.api_key.clone(), template)
        .with_key_param(args.key_param.clone())
        .with_ttl(Duration::from_secs(args.cache_ttl_secs));

    if config.api_key.is_none() {
        warn!("TILE_API_KEY is not set; tile requests will fail with 500");
    }

    let upstream = Arc::new(
        ReqwestUpstream::new(Duration::from_secs(args.upstream_timeout_secs))
            .context("Failed to build upstream client")?,
    );

    let state = match &args.redis_url {
        Some(redis_url) => {
            let store = RedisTileStore::connect(redis_url)
                .await
                .context("Failed to connect to Redis")?;
            info!(backend = store.backend(), "Tile store ready");
            AppState::new(config, Arc::new(store), upstream)
        }
        None => {
            let store = MemoryTileStore::new();
            info!(backend = store.backend(), "Tile store ready");
            spawn_purge_task(store.clone());
            let stats = store.stats();
            AppState::new(config, Arc::new(store), upstream).with_memory_stats(stats)
        }
    };
    let state = Arc::new(state);

    info!(
        upstream = %args.upstream_url,
        ttl_secs = args.cache_ttl_secs,
        "Proxy configured"
    );

    // Admin listener
    let admin_addr = SocketAddr::from(([0, 0, 0, 0], args.admin_port));
    let admin_app = admin_router(state.clone(), prometheus_handle);
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("Failed to bind admin port {}", admin_addr))?;
    info!(address = %admin_addr, "Admin listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(admin_listener, admin_app).await {
            error!(error = %e, "Admin server failed");
        }
    });

    // Tile listener
    let addr: SocketAddr = args.listen.parse().context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Listening");

    axum::serve(listener, tile_router(state)).await?;

    Ok(())
}

/// Periodically drop expired tiles from the in-process store.
fn spawn_purge_task(store: MemoryTileStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            store.purge_expired().await;
        }
    });
}

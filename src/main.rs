//! Advanced Cache host
//!
//! Serves one cache instance over HTTP and logs its lifecycle events.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use advanced_cache::api::{create_router, AppState};
use advanced_cache::{AdvancedCache, CacheConfig, CacheEvent, ServerConfig};

/// Main entry point for the cache host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache and server configuration from environment variables
/// 3. Create the cache, which starts its cleanup and persistence timers
/// 4. Start the event logger
/// 5. Create Axum router with all endpoints
/// 6. Serve until SIGINT/SIGTERM, then close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "advanced_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Advanced Cache host");

    let cache_config = CacheConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!(
        "Configuration loaded: max_size_bytes={}, max_items={}, default_ttl_ms={}, port={}",
        cache_config.max_size_bytes,
        cache_config.max_items,
        cache_config.default_ttl_ms,
        server_config.server_port
    );
    if cache_config.clustering {
        warn!(
            nodes = cache_config.cluster_nodes.len(),
            "Clustering is configured but not supported; running standalone"
        );
    }

    let cache = AdvancedCache::new(cache_config);
    let logger = spawn_event_logger(&cache);

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.close().await;
    if let Some(logger) = logger {
        let _ = logger.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Logs every cache event until the bus closes.
fn spawn_event_logger(cache: &AdvancedCache) -> Option<tokio::task::JoinHandle<()>> {
    let mut events = cache.subscribe()?;

    Some(tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CacheEvent::Error {
                    key,
                    operation,
                    error,
                }) => {
                    warn!(?key, ?operation, %error, "Cache error event");
                }
                Ok(CacheEvent::Get { key, .. }) => debug!(%key, "Cache hit"),
                Ok(event) => info!(event = event.name(), "Cache event"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

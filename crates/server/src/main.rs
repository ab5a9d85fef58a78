//! ogshot server entry point.
//!
//! Boots the HTTP server that renders and caches Open Graph images.
//! Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use ogshot_client::{BrowserEndpoint, CaptureOptions, ChromiumLauncher, ScreenshotRenderer, Viewport};
use ogshot_core::{AppConfig, CacheDb, CacheGateway};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod inflight;
mod service;
mod sweeper;
#[cfg(test)]
mod testing;

use handler::AppState;
use service::{OgImageService, ServiceOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let addr = config.socket_addr()?;
    let site_origin = config.site_origin_url()?;

    let db = CacheDb::open(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open cache at {}: {e}", config.db_path.display()))?;
    match db.count_images().await {
        Ok(entries) => tracing::info!(path = %config.db_path.display(), entries, "opened image cache"),
        Err(e) => tracing::warn!(error = %e, "could not count cached images"),
    }

    let endpoint = BrowserEndpoint::from_config(&config);
    tracing::info!(?endpoint, wait = ?config.wait_strategy, "configured browser");
    let renderer = ScreenshotRenderer::new(
        ChromiumLauncher::new(endpoint, Viewport::OPEN_GRAPH),
        CaptureOptions::from_config(&config),
    );

    let gateway = CacheGateway::new(Arc::new(db.clone())).with_reads_enabled(config.cache_reads_enabled);
    if !gateway.reads_enabled() {
        tracing::warn!("cache reads disabled; every request will capture");
    }
    let service = OgImageService::new(gateway, Arc::new(renderer), ServiceOptions::from_config(&config));

    if let Some(every) = config.purge_interval() {
        let _sweeper = sweeper::spawn(db.clone(), every);
    }

    if site_origin.is_none() && config.allowed_hosts.is_empty() {
        tracing::warn!("neither site_origin nor allowed_hosts is set; every image request will be rejected");
    }
    let app = handler::build_router(AppState { service, site_origin, allowed_hosts: config.allowed_hosts.clone() });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting ogshot server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ogshot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

//! streaks-offline proxy entry point.
//!
//! Boots the offline cache manager in front of the application origin and
//! serves HTTP. Logging goes to stderr as JSON.

use anyhow::Result;
use streaks_offline_core::{AppConfig, CacheDb};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        version = %config.cache_version,
        db_path = %config.db_path.display(),
        "starting streaks-offline proxy"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let server = handler::ProxyServer::build(&config, db)?;

    // Retries in the background if the origin is down at boot.
    let _startup = handler::bootstrap(server.manager.clone(), config.install_retry()).await;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, server.router()).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}

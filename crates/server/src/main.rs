//! harbor server entry point.
//!
//! Boots the offline cache controller for the configured site and serves it
//! as an MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use harbor_client::{FetchClient, FetchConfig};
use harbor_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage, Registration};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

async fn open_storage(config: &AppConfig) -> Result<Arc<dyn CacheStorage>> {
    if config.in_memory() {
        tracing::info!("using in-memory cache storage");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    Ok(Arc::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(origin = %config.origin, version = %config.version, "starting harbor on stdio transport");

    let storage = open_storage(&config).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
    let registration = Arc::new(Registration::new(storage, network));

    let controller = registration.controller(config.version_tag()?, config.manifest(), config.strategy);
    if let Err(e) = registration.register(controller).await {
        tracing::warn!(error = %e, "initial install failed; serving uncontrolled until site_update succeeds");
    }

    let handler = handler::HarborServer::new(Arc::clone(&registration), Arc::clone(&config));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    registration.settle().await;

    Ok(())
}

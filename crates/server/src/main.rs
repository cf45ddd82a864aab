mod api;
mod config;
mod error;

use std::path::Path;
use std::sync::Arc;

use portfolio_pulse_core::hub::BroadcastHub;
use portfolio_pulse_core::models::reference::ReferenceTable;
use portfolio_pulse_core::providers::registry::QuoteSourceRegistry;
use portfolio_pulse_core::providers::traits::QuoteSource;
use portfolio_pulse_core::storage::memory::MemoryStore;
use portfolio_pulse_core::storage::traits::HoldingsStore;
use portfolio_pulse_core::PortfolioPulse;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn HoldingsStore> = if Path::new(&config.holdings_path).exists() {
        info!(path = %config.holdings_path, "loading holdings");
        Arc::new(MemoryStore::load_from_file(&config.holdings_path)?)
    } else {
        warn!(path = %config.holdings_path, "holdings file not found; starting empty");
        Arc::new(MemoryStore::new())
    };

    let reference = match &config.reference_path {
        Some(path) => ReferenceTable::from_json_file(path)?,
        None => ReferenceTable::default(),
    };

    let registry = QuoteSourceRegistry::new_with_defaults(&config.quote_sources);
    let quotes: Option<Arc<dyn QuoteSource>> = if registry.is_empty() {
        None
    } else {
        info!(providers = ?registry.provider_names(), "quote sources configured");
        Some(Arc::new(registry))
    };

    let hub = BroadcastHub::new(config.hub.clone());
    let pulse = Arc::new(PortfolioPulse::new(store, quotes, Arc::new(reference), hub));

    let mut scheduler = pulse.scheduler(config.scheduler.clone());
    scheduler.start();

    let app = api::app_router(Arc::clone(&pulse));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

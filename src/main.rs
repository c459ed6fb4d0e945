use std::sync::Arc;

use actix_web::web;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod metrics;
mod store;
mod utils;

use config::Config;
use store::{MemoryStore, OrderStore, PgStore};
use utils::{retry_with_backoff, RetryConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize structured logging with environment-based filtering
    // `--log-filter` wins over RUST_LOG; both fall back to the default
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info,orders_api=debug")))
        .init();

    config.validate()?;

    tracing::info!("🚀 Starting Orders API");

    // === 1. Build the store ===
    let store = build_store(&config).await?;
    store.ping().await?;

    // === 2. Initialize Prometheus metrics ===
    tracing::info!("Initializing metrics");
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());
    let metrics_registry = Arc::new(metrics.registry().clone());

    // === 3. Wire services into shared state ===
    let state = web::Data::new(api::AppState::new(store, metrics, config.pagination()));

    // === 4. Serve API and metrics until one of them stops ===
    futures_util::try_join!(
        api::start_api_server(state, config.bind.clone(), config.port),
        metrics::start_metrics_server(metrics_registry, config.bind.clone(), config.metrics_port),
    )?;

    tracing::info!("👋 Orders API stopped");
    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn OrderStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("No DATABASE_URL configured, keeping orders in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    tracing::info!("Connecting to PostgreSQL...");
    let store = retry_with_backoff(RetryConfig::startup(config.db_connect_attempts), |attempt| async move {
        tracing::debug!(attempt = attempt, "Opening database pool");
        PgStore::connect(url, config.db_max_connections).await
    })
    .await?;
    store.migrate().await?;

    tracing::info!("✅ Connected to PostgreSQL");
    Ok(Arc::new(store))
}

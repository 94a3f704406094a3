use anyhow::Result;
use std::time::Duration;
use tracing::info;

use chama_api::app::{create_app, AppState};
use chama_api::config::Config;
use chama_api::jobs::{JobScheduler, PoolMetricsJob, TombstonePruneJob};
use chama_api::middleware::{init_metrics, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting chama engine v{}", env!("CARGO_PKG_VERSION"));

    let db_config = persistence::db::DatabaseConfig::from(&config.database);
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;

    let addr = config.socket_addr();
    let state = AppState::new(config, pool.clone())?;

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(pool));
    scheduler.register(TombstonePruneJob::new(state.notifications.clone()));
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! CrossCal - three-way event synchronisation service
//!
//! Main entry point: logging, configuration, context wiring, background
//! schedulers and the HTTP trigger surface.

use std::sync::Arc;

use crosscal_app::{router, AppContext, BackgroundScheduler, SchedulerConfig};
use crosscal_infra::loader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so we can see .env loading
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables from .env file
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => tracing::debug!("no .env file loaded: {}", e),
    }

    let config = loader::load()?;
    let bind_addr = config.server.bind_addr.clone();
    let scheduler_config = SchedulerConfig::from_config(&config);

    let ctx = Arc::new(AppContext::from_config(config)?);
    info!("application context initialised");

    let mut scheduler = BackgroundScheduler::new(Arc::clone(&ctx), scheduler_config);
    scheduler.start().await.map_err(anyhow::Error::msg)?;

    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening for triggers");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    scheduler.stop().await.map_err(anyhow::Error::msg)?;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

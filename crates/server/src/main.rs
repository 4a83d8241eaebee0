mod bootstrap;
mod health;
mod sessions;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use trailhead_agent::Engine;
use trailhead_core::config::{AppConfig, LoadOptions};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use trailhead_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let router = Router::new()
        .merge(health::router(health::HealthState {
            catalog: Arc::clone(&app.catalog),
            engine: Arc::clone(&app.engine),
        }))
        .merge(sessions::router(sessions::SessionsState { engine: Arc::clone(&app.engine) }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "trailhead-server listening"
    );

    let cleanup = tokio::spawn(evict_completed_sessions(Arc::clone(&app.engine)));

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;
    cleanup.abort();

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "trailhead-server stopping"
    );

    Ok(())
}

async fn evict_completed_sessions(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        engine.cleanup_completed().await;
    }
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}

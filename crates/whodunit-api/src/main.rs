//! Whodunit API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use whodunit_api::config::ServerConfig;
use whodunit_api::error::AppError;
use whodunit_api::providers::OfflineProviders;
use whodunit_api::state::AppState;
use whodunit_content::Scenario;
use whodunit_core::clock::SystemClock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Whodunit API server");

    // Read configuration from environment.
    let config = ServerConfig::from_env()?;
    let scenario = Scenario::load(&config.scenario_path).map_err(AppError::from)?;
    tracing::info!(
        title = %scenario.title(),
        digest = %scenario.digest(),
        path = %config.scenario_path.display(),
        "scenario ready"
    );

    // Build application state.
    let app_state = AppState::new(
        scenario,
        config.engine.clone(),
        Arc::new(SystemClock),
        Arc::new(OfflineProviders::new(config.rng_seed)),
        config.rng_seed,
    )
    .with_retention(config.retention);

    let app = whodunit_api::app(app_state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::from)?;

    axum::serve(listener, app).await.map_err(AppError::from)?;

    Ok(())
}

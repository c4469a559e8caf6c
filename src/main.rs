mod api;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod observability;
mod services;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::engine::scheduler::ShiftScheduler;
use crate::services::notify::LogPush;
use crate::services::routing::StraightLineRouter;

#[tokio::main]
async fn main() -> Result<(), error::DispatchError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let app_state = state::AppState::new(
        &config,
        Arc::new(StraightLineRouter::new()),
        Arc::new(LogPush),
    )?;
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    let rotation_period = Duration::from_secs(config.shift_rotation_hours * 3600);
    tokio::spawn(ShiftScheduler::new(shared_state.clone(), rotation_period).run());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::DispatchError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::DispatchError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

//! Main Entrypoint for the VisionTalk Relay Service
//!
//! This binary is responsible for:
//! 1. Initializing logging.
//! 2. Loading configuration from the environment.
//! 3. Building the Gemini Live connector and shared state.
//! 4. Serving the relay until a shutdown signal arrives.

use anyhow::Context;
use gemini_realtime::GeminiLiveConnector;
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use visiontalk_relay::{
    config::Config,
    server::{serve, shutdown_signal},
    state::AppState,
};

#[tokio::main]
async fn main() -> ExitCode {
    // --- 1. Initialize Logging ---
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // --- 2. Load Configuration ---
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => {
            info!("Relay has shut down.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "Relay terminated with error.");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    // --- 3. Initialize Shared Services ---
    let connector = GeminiLiveConnector::new(config.gemini_api_key.clone())
        .with_endpoint(config.gemini_live_url.clone());
    let bind_address = config.bind_address;
    info!(
        model = %config.model,
        bind_address = %bind_address,
        "Service configured. Starting relay..."
    );
    let app_state = Arc::new(AppState::new(&config, Arc::new(connector)));

    // --- 4. Start Server ---
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(%bind_address, "Relay listening.");

    serve(listener, app_state, shutdown_signal()).await
}

//! Axum Router Configuration
//!
//! This module defines the HTTP routing for the relay: the liveness endpoint
//! and the WebSocket upgrade.

use crate::{handlers, state::AppState, ws::ws_handler};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Browsers connect to the bare origin; `/ws` is kept for explicit clients.
    let relay_router = Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(relay_router)
        .layer(cors)
}

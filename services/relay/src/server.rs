//! Relay server loop and graceful shutdown.

use crate::{router::create_router, state::AppState};
use anyhow::Context;
use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// How long shutdown waits for connections to finish closing.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves the relay on `listener` until `shutdown` resolves.
///
/// On shutdown every registered connection is asked to close, new connections
/// stop being accepted, and the call returns once all connections are gone or
/// [`DRAIN_TIMEOUT`] elapses.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let app = create_router(state);

    let close_connections = {
        let registry = registry.clone();
        async move {
            shutdown.await;
            info!("Shutdown requested. Closing client connections...");
            registry.close_all().await;
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(close_connections)
    .await
    .context("Relay server failed")?;

    if registry.wait_drained(DRAIN_TIMEOUT).await {
        info!("All client connections drained.");
    } else {
        let remaining = registry.len().await;
        warn!(remaining, "Timed out waiting for client connections to close.");
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C.");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C shutdown signal.");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM shutdown signal.");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

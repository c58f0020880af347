//! Axum API server for the program relay.

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::gateway::ProgramGateway;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-backed program pipeline.
    pub gateway: Arc<ProgramGateway>,
    /// When the server state was created (reported by `/health`).
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gateway: ProgramGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            started_at: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
///
/// The program route is served with and without the trailing slash; the
/// frontend requests the slash-less form.
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    // The frontend is served from a different origin inside the controller.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(super::routes::health::get_health))
        .route("/{port}/{address}", get(super::routes::program::get_program))
        .route("/{port}/{address}/", get(super::routes::program::get_program))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind the listener and serve until Ctrl-C or SIGTERM.
pub async fn start_server(config: &RelayConfig, state: AppState) -> Result<()> {
    let app = build_router(state);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    // Resolves port 0 to the port actually assigned.
    let local = listener.local_addr()?;
    info!(
        addr = %local,
        cache_ttl_secs = config.cache_ttl_secs,
        coalesce = config.coalesce_fetches,
        "Program relay listening on http://{local}"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Program relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

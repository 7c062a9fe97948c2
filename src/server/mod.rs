//! HTTP surface: router, shared state, serving

pub mod error;
pub mod routes;

use crate::alert::AlertDispatcher;
use crate::config::ServerConfig;
use crate::metrics::ServiceMetrics;
use crate::models::InferenceService;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// Application state shared across handlers. Built once at startup and
/// never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<InferenceService>,
    pub alerts: Arc<AlertDispatcher>,
    pub metrics: Arc<ServiceMetrics>,
}

/// Build the router with middleware
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let index = ServeFile::new(config.static_dir.join("index.html"));
    let results = ServeFile::new(config.static_dir.join("results.html"));

    Router::new()
        // Static pages
        .route_service("/", index)
        .route_service("/results.html", results)
        // Health endpoints
        .route("/health", get(routes::liveness))
        .route("/health/live", get(routes::liveness))
        .route("/health/ready", get(routes::readiness))
        .route("/metrics", get(routes::metrics))
        // API endpoints
        .route("/upload", post(routes::upload))
        .route("/emergency", post(routes::emergency))
        // Middleware layers
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM
pub async fn serve(config: &ServerConfig, app: Router) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST:PORT configuration")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("neuroguard v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received, draining connections");
}

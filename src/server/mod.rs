//! Quote Book HTTP server
//!
//! Thin axum layer over [`Storage`]: JSON in and out, error kinds mapped
//! to status codes, one tracing span per request.

pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::{extract::Extension, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    pub address: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_string(),
            timeout_secs: 30,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config("server address must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("server timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub config: ServerConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}

/// Build the application router with all routes and layers
pub fn build_router(config: ServerConfig, storage: Arc<Storage>) -> Router {
    crate::metrics::init_metrics();

    let timeout = Duration::from_secs(config.timeout_secs);
    let enable_cors = config.enable_cors;
    let state = AppState { storage, config };

    let app = Router::new()
        .merge(routes::quote_routes())
        .merge(routes::admin_routes())
        .layer(Extension(Arc::new(state)))
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the Quote Book server and serve until SIGINT/SIGTERM
pub async fn start_server(config: ServerConfig, storage: Arc<Storage>) -> anyhow::Result<()> {
    info!(
        addr = %config.address,
        timeout_secs = config.timeout_secs,
        "Starting Quote Book HTTP server"
    );

    let addr = config.address.clone();
    let app = build_router(config, storage);
    let listener = TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Health: http://{}/_health", addr);
    info!("Metrics: http://{}/_metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("Server failed: {}", e)
        })?;

    info!("Server gracefully stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

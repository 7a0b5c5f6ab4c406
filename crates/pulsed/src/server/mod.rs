//! HTTP surface of the daemon.
//!
//! One router serves both halves of the pipeline: the write side
//! (`POST /api/v1/activity`, uniform 2xx) and the read side (usage
//! queries, which do return real errors). Authentication runs as a
//! middleware layer so every handler sees a resolved `Caller`.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use pulse_core::TelemetryConfig;

use crate::reconciler::ReconcilerHandle;

pub mod auth;
pub mod routes;

pub use auth::{Caller, TokenTable};

/// Errors from running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state for all request handlers.
pub struct AppState {
    pub reconciler: ReconcilerHandle,
    pub tokens: TokenTable,
    pub telemetry: TelemetryConfig,
}

/// Builds the router with all routes and layers.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/activity", post(routes::ingest_activity))
        .route("/v1/usage/:day", get(routes::get_usage_day))
        .route("/v1/usage", get(routes::get_usage_range));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .route("/health", get(routes::health_check))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(cors)
        .with_state(state)
}

/// The daemon's HTTP server.
pub struct HttpServer {
    addr: String,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(addr: impl Into<String>, state: Arc<AppState>) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    /// Binds and serves until the cancellation token fires, then
    /// drains in-flight requests.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        info!(addr = %self.addr, "HTTP server listening");

        let app = router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

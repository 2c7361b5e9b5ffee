//! Advisor HTTP server with axum router and graceful shutdown.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    get_health, get_integrity, post_ask, post_escalation_only, post_reload, post_reset, AppState,
};
use super::ServerError;
use crate::config::ServerConfig;
use crate::engine::AdvisorEngine;

/// HTTP front end for an [`AdvisorEngine`].
pub struct AdvisorServer {
    config: ServerConfig,
    state: AppState,
    cancel: CancellationToken,
}

impl AdvisorServer {
    /// Create a server with default configuration.
    #[must_use]
    pub fn new(engine: Arc<AdvisorEngine>, cancel: CancellationToken) -> Self {
        Self {
            config: ServerConfig::default(),
            state: AppState::new(engine),
            cancel,
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/api/ask", post(post_ask))
            .route("/api/health", get(get_health))
            .route("/api/integrity", get(get_integrity))
            .route("/api/admin/reset", post(post_reset))
            .route("/api/admin/escalation-only", post(post_escalation_only))
            .route("/api/admin/reload", post(post_reload))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ServerError> {
        let address = self.address();
        let cancel = self.cancel.clone();
        let app = self.build_router();

        tracing::info!(address = %address, "Starting advisor API server");

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::BindError {
                address: address.clone(),
                source,
            })?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Advisor API server shutting down gracefully");
            })
            .await
            .map_err(ServerError::Serve)
    }
}

//! HTTP API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ErrorResponse;
use crate::catalog::StoreError;

/// Errors that can occur while serving the API.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The request body was well-formed JSON but not a valid request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The listener failed while serving.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The knowledge store failed during an admin action.
    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            Self::Store(e) => {
                tracing::warn!(error = %e, "Store error while handling request");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Catalog store unavailable".to_string(),
                )
            }
            Self::BindError { .. } | Self::Serve(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

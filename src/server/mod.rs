//! HTTP API for asking questions and administering the safety layer.

mod api;
mod error;
mod handlers;
#[allow(clippy::module_inception)]
mod server;

pub use api::{
    AskRequest, CommandResponse, ErrorResponse, EscalationOnlyRequest, HealthResponse,
    ReloadResponse,
};
pub use error::ServerError;
pub use handlers::AppState;
pub use server::AdvisorServer;

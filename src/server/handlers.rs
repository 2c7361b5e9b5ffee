//! HTTP handlers for the advisor API.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::api::{
    AskRequest, CommandResponse, EscalationOnlyRequest, HealthResponse, ReloadResponse,
};
use super::ServerError;
use crate::compose::AdvisorResponse;
use crate::engine::AdvisorEngine;
use crate::graph::IntegrityReport;
use crate::router::StudentContext;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AdvisorEngine>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<AdvisorEngine>) -> Self {
        Self { engine }
    }
}

/// POST /api/ask - Answer a question.
pub async fn post_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AdvisorResponse>, ServerError> {
    if request.question.trim().is_empty() {
        return Err(ServerError::BadRequest("question must not be empty".into()));
    }

    let codes = state.engine.codes();
    let mut student = StudentContext {
        year: request.year,
        track: request.track,
        ..StudentContext::default()
    };
    for raw in &request.completed {
        let code = codes
            .parse(raw)
            .ok_or_else(|| ServerError::BadRequest(format!("unrecognized course code '{raw}'")))?;
        student.completed.insert(code);
    }

    let response = state.engine.ask(&request.question, &student).await;
    Ok(Json(response))
}

/// GET /api/health - Safety state and catalog size.
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let graph = state.engine.graph();
    let clean = graph.integrity_report().is_clean();
    Json(HealthResponse::new(
        graph.len(),
        clean,
        state.engine.safety_report(),
    ))
}

/// GET /api/integrity - Cycles and dangling edges in the current graph.
pub async fn get_integrity(State(state): State<AppState>) -> Json<IntegrityReport> {
    Json(state.engine.integrity_report())
}

/// POST /api/admin/reset - Close every circuit and leave escalation-only mode.
pub async fn post_reset(State(state): State<AppState>) -> Json<CommandResponse> {
    state.engine.reset_circuit_breaker();
    Json(CommandResponse::success("Circuit breakers reset"))
}

/// POST /api/admin/escalation-only - Toggle emergency rollback.
pub async fn post_escalation_only(
    State(state): State<AppState>,
    Json(request): Json<EscalationOnlyRequest>,
) -> Json<CommandResponse> {
    state.engine.force_escalation_only(request.enabled);
    let message = if request.enabled {
        "Escalation-only mode enabled"
    } else {
        "Escalation-only mode disabled"
    };
    Json(CommandResponse::success(message))
}

/// POST /api/admin/reload - Rebuild the graph from the store.
pub async fn post_reload(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ServerError> {
    let integrity = state.engine.reload_from_store().await?;
    Ok(Json(ReloadResponse {
        success: true,
        integrity,
    }))
}

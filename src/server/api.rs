//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::classify::YearLevel;
use crate::graph::IntegrityReport;
use crate::safety::SafetyReport;

/// Body of POST /api/ask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Completed courses in any accepted spelling (`cs180`, `CS 18000`).
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub year: Option<YearLevel>,
    #[serde(default)]
    pub track: Option<String>,
}

/// Body of POST /api/admin/escalation-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EscalationOnlyRequest {
    pub enabled: bool,
}

/// Response for GET /api/health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok` when every circuit is closed and no rollback is active.
    pub status: &'static str,
    pub courses: usize,
    pub integrity_clean: bool,
    pub safety: SafetyReport,
}

impl HealthResponse {
    #[must_use]
    pub fn new(courses: usize, integrity_clean: bool, safety: SafetyReport) -> Self {
        let status = if safety.is_healthy() && integrity_clean {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status,
            courses,
            integrity_clean,
            safety,
        }
    }
}

/// Response for POST /api/admin/reload.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub integrity: IntegrityReport,
}

/// Response for command endpoints (POST /api/admin/reset, /api/admin/escalation-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command was successful.
    pub success: bool,
    /// Message describing the result.
    pub message: String,
}

impl CommandResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// JSON body for error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_minimal_body() {
        let request: AskRequest = serde_json::from_str(r#"{"question": "CS 182"}"#).unwrap();
        assert_eq!(request.question, "CS 182");
        assert!(request.completed.is_empty());
        assert!(request.year.is_none());
    }

    #[test]
    fn test_ask_request_full_body() {
        let request: AskRequest = serde_json::from_str(
            r#"{"question": "can I take CS 25200", "completed": ["cs180", "CS 18200"], "year": "sophomore", "track": "machine_intelligence"}"#,
        )
        .unwrap();
        assert_eq!(request.completed.len(), 2);
        assert_eq!(request.year, Some(YearLevel::Sophomore));
    }

    #[test]
    fn test_command_response_serialization() {
        let json = serde_json::to_value(CommandResponse::success("done")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
    }
}

//! Routing errors, answers and the per-query decision record.

use std::time::Duration;

use serde::Serialize;

use super::Tier;
use crate::catalog::{Course, CourseCode, PolicySet, StoreError, Track};
use crate::classify::QueryKind;
use crate::graph::{Eligibility, FailureImpact, GraphError, Requirement, Roadmap};

/// How the router reacts to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Try the same tier once more, then fall back one tier.
    Retryable,
    /// Fall back one tier immediately.
    Terminal,
    /// Jump straight to escalation with the candidates as context.
    Ambiguous,
}

/// Errors raised while answering a query at one tier.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous input; candidates: {}", .candidates.join(", "))]
    AmbiguousInput { candidates: Vec<String> },

    #[error("Data integrity error: {0}")]
    Integrity(String),

    #[error("Knowledge store temporarily unavailable: {0}")]
    TransientUnavailable(String),

    #[error("Circuit open for the {0} tier")]
    CircuitOpen(Tier),

    #[error("Escalation failed: {0}")]
    EscalationFailure(String),

    #[error("The {tier} tier cannot answer {kind} questions")]
    Unsupported { tier: Tier, kind: QueryKind },
}

impl RouteError {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::TransientUnavailable(_) => FailureClass::Retryable,
            Self::AmbiguousInput { .. } => FailureClass::Ambiguous,
            Self::NotFound(_)
            | Self::Integrity(_)
            | Self::CircuitOpen(_)
            | Self::EscalationFailure(_)
            | Self::Unsupported { .. } => FailureClass::Terminal,
        }
    }

    /// Whether the failure says something about the tier's health rather
    /// than about the question.
    #[must_use]
    pub fn counts_against_tier(&self) -> bool {
        matches!(
            self,
            Self::TransientUnavailable(_) | Self::Integrity(_) | Self::EscalationFailure(_)
        )
    }

    /// Stable short name for logs and the attempt trail.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AmbiguousInput { .. } => "ambiguous_input",
            Self::Integrity(_) => "integrity",
            Self::TransientUnavailable(_) => "transient_unavailable",
            Self::CircuitOpen(_) => "circuit_open",
            Self::EscalationFailure(_) => "escalation_failure",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

impl From<StoreError> for RouteError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::TransientUnavailable(err.to_string())
        } else {
            Self::Integrity(err.to_string())
        }
    }
}

impl From<GraphError> for RouteError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound(code) => Self::NotFound(code.to_string()),
            other => {
                tracing::warn!(error = %other, "Graph integrity error while routing");
                Self::Integrity(other.to_string())
            }
        }
    }
}

/// A successful answer, before rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    Courses {
        courses: Vec<Course>,
    },
    Track {
        track: Track,
    },
    Policies {
        policies: Vec<PolicySet>,
    },
    Prerequisites {
        course: CourseCode,
        direct: Vec<Requirement>,
        all: Vec<CourseCode>,
    },
    Chain {
        course: CourseCode,
        chain: Vec<CourseCode>,
    },
    Eligibility {
        eligibility: Eligibility,
    },
    FailureImpact {
        impact: FailureImpact,
    },
    Sequence {
        course: CourseCode,
        unlocks: Vec<CourseCode>,
        /// Unlocked courses the student could take right after this one.
        now_eligible: Vec<CourseCode>,
    },
    Roadmap {
        roadmap: Roadmap,
    },
    Generated {
        text: String,
    },
}

/// Result of one attempt in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    FailedRetryable,
    FailedTerminal,
    /// The gate closed the tier; nothing was tried.
    Skipped,
}

/// One step of the routing state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub tier: Tier,
    pub kind: Option<QueryKind>,
    pub outcome: AttemptOutcome,
    pub error: Option<&'static str>,
    pub elapsed_ms: u64,
}

impl Attempt {
    pub(crate) fn skipped(tier: Tier) -> Self {
        Self {
            tier,
            kind: None,
            outcome: AttemptOutcome::Skipped,
            error: Some(RouteError::CircuitOpen(tier).label()),
            elapsed_ms: 0,
        }
    }

    pub(crate) fn finished(
        tier: Tier,
        kind: QueryKind,
        result: &Result<Answer, RouteError>,
        elapsed: Duration,
    ) -> Self {
        let outcome = match result {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(e) if e.class() == FailureClass::Retryable => AttemptOutcome::FailedRetryable,
            Err(_) => AttemptOutcome::FailedTerminal,
        };
        Self {
            tier,
            kind: Some(kind),
            outcome,
            error: result.as_ref().err().map(RouteError::label),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Everything the router decided for one query.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub kind: QueryKind,
    /// The tier that produced the outcome, if any attempt ran.
    pub tier: Option<Tier>,
    pub rationale: String,
    pub elapsed: Duration,
    pub attempts: Vec<Attempt>,
    pub outcome: Result<Answer, RouteError>,
}

impl RoutingDecision {
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The answering tier's fixed confidence, or zero on failure.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        match (&self.outcome, self.tier) {
            (Ok(_), Some(tier)) => tier.confidence(),
            _ => 0.0,
        }
    }

    /// Tiers the gate skipped.
    pub fn skipped(&self) -> impl Iterator<Item = Tier> + '_ {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Skipped)
            .map(|a| a.tier)
    }
}

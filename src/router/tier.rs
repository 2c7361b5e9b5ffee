//! Processing tiers and their fallback order.

use serde::{Deserialize, Serialize};

use crate::classify::QueryKind;

/// Where a query gets answered, from least to most inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Direct key-based read from the knowledge store.
    Structured,
    /// Derivation over the prerequisite graph.
    RuleBased,
    /// Delegation to the text-generation collaborator.
    Escalation,
}

impl Tier {
    /// Tiers in the order the router falls through them.
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Structured, Self::RuleBased, Self::Escalation];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::RuleBased => "rule_based",
            Self::Escalation => "escalation",
        }
    }

    /// Fixed confidence attached to answers from this tier.
    #[must_use]
    pub fn confidence(self) -> f64 {
        match self {
            Self::Structured => 0.95,
            Self::RuleBased => 0.85,
            Self::Escalation => 0.6,
        }
    }

    /// The tier a kind prefers.
    #[must_use]
    pub fn for_kind(kind: QueryKind) -> Self {
        match kind {
            QueryKind::CourseInfo
            | QueryKind::TrackRequirements
            | QueryKind::Policy
            | QueryKind::CourseLoad => Self::Structured,
            QueryKind::Prerequisites
            | QueryKind::PrerequisiteChain
            | QueryKind::Eligibility
            | QueryKind::FailureImpact
            | QueryKind::CourseSequence
            | QueryKind::Roadmap => Self::RuleBased,
            QueryKind::Comparison | QueryKind::Opinion | QueryKind::Career | QueryKind::General => {
                Self::Escalation
            }
        }
    }

    /// Whether this tier has a handler for `kind`.
    #[must_use]
    pub fn handles(self, kind: QueryKind) -> bool {
        match self {
            Self::Structured => Self::for_kind(kind) == Self::Structured,
            // Course facts are also graph nodes.
            Self::RuleBased => {
                Self::for_kind(kind) == Self::RuleBased || kind == QueryKind::CourseInfo
            }
            Self::Escalation => true,
        }
    }

    /// Position in [`FALLBACK_ORDER`](Self::FALLBACK_ORDER).
    #[must_use]
    pub fn position(self) -> usize {
        Self::FALLBACK_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(Self::FALLBACK_ORDER.len() - 1)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

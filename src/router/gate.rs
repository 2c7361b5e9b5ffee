//! Admission control seam between the router and the safety layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{RouteError, Tier};

/// How an attempt bears on a tier's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierOutcome {
    Success,
    Failure,
    /// The question, not the tier, was the problem (unknown entity,
    /// ambiguous input, unsupported kind).
    Neutral,
}

impl TierOutcome {
    #[must_use]
    pub fn of<T>(result: &Result<T, RouteError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) if e.counts_against_tier() => Self::Failure,
            Err(_) => Self::Neutral,
        }
    }
}

/// Decides which tiers may be attempted and learns from their outcomes.
pub trait TierGate: Send + Sync {
    /// Whether `tier` may be attempted now.
    fn admit(&self, tier: Tier) -> bool;

    /// Record the outcome of one attempt at `tier`.
    fn record(&self, tier: Tier, outcome: TierOutcome, elapsed: Duration);
}

/// A gate that admits every tier and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl TierGate for OpenGate {
    fn admit(&self, _tier: Tier) -> bool {
        true
    }

    fn record(&self, _tier: Tier, _outcome: TierOutcome, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let ok: Result<(), RouteError> = Ok(());
        assert_eq!(TierOutcome::of(&ok), TierOutcome::Success);

        let down: Result<(), RouteError> = Err(RouteError::TransientUnavailable("db".into()));
        assert_eq!(TierOutcome::of(&down), TierOutcome::Failure);

        let missing: Result<(), RouteError> = Err(RouteError::NotFound("CS 99900".into()));
        assert_eq!(TierOutcome::of(&missing), TierOutcome::Neutral);
    }
}

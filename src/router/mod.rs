//! Tiered routing: structured lookup, rule-based derivation, escalation.

mod decision;
mod dispatch;
mod gate;
mod handlers;
mod tier;

pub use decision::{
    Answer, Attempt, AttemptOutcome, FailureClass, RouteError, RoutingDecision,
};
pub use dispatch::{Router, StudentContext};
pub use gate::{OpenGate, TierGate, TierOutcome};
pub use tier::Tier;

//! End-to-end routing tests through the advisor engine.

mod fakes;
mod fallback_test;
mod monotonic_test;
mod scenarios_test;

/// Verify the routing surface is exported from the library.
#[test]
fn test_all_router_types_exported() {
    use course_advisor::router::{
        Answer, Attempt, AttemptOutcome, FailureClass, OpenGate, RouteError, Router,
        RoutingDecision, StudentContext, Tier, TierGate, TierOutcome,
    };

    let _: fn() -> StudentContext = StudentContext::default;
    let _ = OpenGate;
    let _: Option<(Answer, Attempt, RoutingDecision, Router)> = None;
    let _: &dyn TierGate = &OpenGate;
    assert_eq!(
        RouteError::TransientUnavailable("x".into()).class(),
        FailureClass::Retryable
    );
    assert_eq!(TierOutcome::of::<()>(&Ok(())), TierOutcome::Success);
    assert_ne!(AttemptOutcome::Succeeded, AttemptOutcome::Skipped);
    assert_eq!(Tier::FALLBACK_ORDER.len(), 3);
}

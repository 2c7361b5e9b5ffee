//! Fallback and circuit breaker behaviour with a failing store.

use std::sync::Arc;

use course_advisor::catalog::sample_catalog;
use course_advisor::compose::APOLOGY;
use course_advisor::router::{Answer, AttemptOutcome, StudentContext, Tier};
use course_advisor::safety::CircuitStatus;

use super::fakes::{engine_over, no_retry_config, sample_engine, DownGenerator, FlakyStore};

#[tokio::test]
async fn five_structured_failures_route_sixth_query_to_rule_tier() {
    let store = Arc::new(FlakyStore::new(sample_catalog()));
    let engine = engine_over(store.clone(), no_retry_config(), None).await;
    store.set_failing(true);
    let student = StudentContext::default();

    for _ in 0..5 {
        let response = engine.ask("CS 182", &student).await;
        // Course facts are graph nodes, so the rule tier still answers.
        assert_eq!(response.tier, Some(Tier::RuleBased));
        assert!(response.degraded);
    }
    assert_eq!(store.lookups(), 5);

    let report = engine.safety_report();
    let structured = report.tier(Tier::Structured).expect("structured tier reported");
    assert_eq!(structured.status, CircuitStatus::Open);
    assert_eq!(structured.trips, 1);
    assert!(!report.is_healthy());

    let response = engine.ask("CS 182", &student).await;
    assert!(response.success);
    assert_eq!(response.tier, Some(Tier::RuleBased));
    assert_eq!(response.attempts[0].tier, Tier::Structured);
    assert_eq!(response.attempts[0].outcome, AttemptOutcome::Skipped);
    // The open tier was not touched.
    assert_eq!(store.lookups(), 5);
    assert!(matches!(response.data, Some(Answer::Courses { .. })));
}

#[tokio::test]
async fn breaker_recovers_after_cooldown_and_success() {
    let store = Arc::new(FlakyStore::new(sample_catalog()));
    let mut config = no_retry_config();
    config.safety.cooldown_secs = 0;
    let engine = engine_over(store.clone(), config, None).await;
    let student = StudentContext::default();

    store.set_failing(true);
    for _ in 0..5 {
        engine.ask("CS 182", &student).await;
    }
    let structured = engine.safety_report();
    assert_eq!(structured.tier(Tier::Structured).map(|t| t.trips), Some(1));

    store.set_failing(false);
    let response = engine.ask("CS 182", &student).await;
    assert_eq!(response.tier, Some(Tier::Structured));
    assert!(!response.degraded);

    let report = engine.safety_report();
    let structured = report.tier(Tier::Structured).expect("structured tier reported");
    assert_eq!(structured.status, CircuitStatus::Closed);
    assert_eq!(structured.consecutive_failures, 0);
}

#[tokio::test]
async fn transient_failure_is_retried_once_by_default() {
    let store = Arc::new(FlakyStore::new(sample_catalog()));
    let engine = engine_over(
        store.clone(),
        course_advisor::config::AdvisorConfig::default(),
        None,
    )
    .await;
    store.set_failing(true);

    let response = engine.ask("CS 182", &StudentContext::default()).await;
    let structured: Vec<_> = response
        .attempts
        .iter()
        .filter(|a| a.tier == Tier::Structured)
        .collect();
    assert_eq!(structured.len(), 2);
    assert!(structured
        .iter()
        .all(|a| a.outcome == AttemptOutcome::FailedRetryable));
    assert_eq!(response.tier, Some(Tier::RuleBased));
}

#[tokio::test]
async fn escalation_failure_is_a_generic_apology() {
    let engine = sample_engine(Some(Arc::new(DownGenerator))).await;
    let response = engine
        .ask(
            "how do track A and track B compare for career goals",
            &StudentContext::default(),
        )
        .await;

    assert!(!response.success);
    assert!(response.degraded);
    assert_eq!(response.answer, APOLOGY);
    assert!(!response.answer.contains("503"));
}

#[tokio::test]
async fn unknown_course_is_reported_when_nothing_can_answer() {
    let engine = sample_engine(None).await;
    let response = engine.ask("CS 999", &StudentContext::default()).await;

    assert!(!response.success);
    assert!(response.answer.contains("check the course code"));
    assert!(response.data.is_none());
}

#[tokio::test]
async fn escalation_only_mode_skips_lower_tiers() {
    let engine = sample_engine(Some(Arc::new(super::fakes::CannedGenerator::default()))).await;
    engine.force_escalation_only(true);

    let response = engine.ask("CS 182", &StudentContext::default()).await;
    assert_eq!(response.tier, Some(Tier::Escalation));
    let skipped: Vec<Tier> = response
        .attempts
        .iter()
        .filter(|a| a.outcome == AttemptOutcome::Skipped)
        .map(|a| a.tier)
        .collect();
    assert_eq!(skipped, vec![Tier::Structured, Tier::RuleBased]);

    engine.reset_circuit_breaker();
    let response = engine.ask("CS 182", &StudentContext::default()).await;
    assert_eq!(response.tier, Some(Tier::Structured));
}

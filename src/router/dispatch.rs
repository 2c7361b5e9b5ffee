//! The per-query routing state machine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::handlers;
use super::{
    Answer, Attempt, FailureClass, RouteError, RoutingDecision, Tier, TierGate, TierOutcome,
};
use crate::ai::TextGenerator;
use crate::catalog::{CourseCode, KnowledgeStore};
use crate::classify::{ClassifiedQuery, QueryKind, YearLevel};
use crate::config::RouterConfig;
use crate::graph::PrerequisiteGraph;

/// What the asker has told us about themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentContext {
    pub completed: BTreeSet<CourseCode>,
    pub year: Option<YearLevel>,
    /// Track id used when the question names none.
    pub track: Option<String>,
}

/// Walks [`Tier::FALLBACK_ORDER`] for each query.
#[derive(Clone)]
pub struct Router {
    config: RouterConfig,
    store: Arc<dyn KnowledgeStore>,
    generator: Option<Arc<dyn TextGenerator>>,
    per_semester_cap: usize,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("store", &self.store.name())
            .field("generator", &self.generator.is_some())
            .field("per_semester_cap", &self.per_semester_cap)
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new(config: RouterConfig, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            config,
            store,
            generator: None,
            per_semester_cap: 3,
        }
    }

    /// Attach the escalation collaborator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_per_semester_cap(mut self, cap: usize) -> Self {
        self.per_semester_cap = cap;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    #[must_use]
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// The tier a query starts at, and why.
    #[must_use]
    pub fn starting_tier(&self, query: &ClassifiedQuery) -> (Tier, String) {
        if query.confidence < self.config.confidence_threshold {
            return (
                Tier::Escalation,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    query.confidence, self.config.confidence_threshold
                ),
            );
        }
        let tier = query
            .matched
            .iter()
            .map(|kind| Tier::for_kind(*kind))
            .min()
            .unwrap_or(Tier::Escalation);
        (tier, format!("{} prefers the {tier} tier", query.kind))
    }

    /// Route one classified query, consulting `gate` before every attempt.
    ///
    /// Never fails; the outcome is carried in the returned decision.
    pub async fn route(
        &self,
        query: &ClassifiedQuery,
        student: &StudentContext,
        graph: &PrerequisiteGraph,
        gate: &dyn TierGate,
    ) -> RoutingDecision {
        let started = Instant::now();
        let (start, reason) = self.starting_tier(query);
        let mut facts = grounding_facts(query, student, graph);
        let mut attempts = Vec::new();
        // First error the user can act on (unknown entity or ambiguity).
        let mut user_facing: Option<(Tier, RouteError)> = None;
        let mut last_error: Option<(Tier, RouteError)> = None;
        let mut position = start.position();

        tracing::debug!(kind = %query.kind, start = %start, reason = %reason, "Routing query");

        while let Some(&tier) = Tier::FALLBACK_ORDER.get(position) {
            if !gate.admit(tier) {
                tracing::debug!(tier = %tier, "Tier closed by gate, skipping");
                attempts.push(Attempt::skipped(tier));
                position += 1;
                continue;
            }

            let kind = kind_for(tier, query);
            match self
                .attempt_with_retry(tier, kind, query, student, graph, &facts, gate, &mut attempts)
                .await
            {
                Ok(answer) => {
                    return decision(query, start, reason, started, attempts, tier, Ok(answer));
                }
                Err(err) if tier == Tier::Escalation => {
                    let (tier, err) = user_facing.unwrap_or((tier, err));
                    return decision(query, start, reason, started, attempts, tier, Err(err));
                }
                Err(err) => {
                    tracing::debug!(tier = %tier, error = %err, "Attempt failed, falling back");
                    if err.class() == FailureClass::Ambiguous {
                        if let RouteError::AmbiguousInput { candidates } = &err {
                            if !candidates.is_empty() {
                                facts.push(format!("Possible matches: {}", candidates.join(", ")));
                            }
                        }
                        position = Tier::Escalation.position();
                    } else {
                        position += 1;
                    }
                    if user_facing.is_none()
                        && matches!(err, RouteError::NotFound(_) | RouteError::AmbiguousInput { .. })
                    {
                        user_facing = Some((tier, err.clone()));
                    }
                    last_error = Some((tier, err));
                }
            }
        }

        // Every remaining tier was closed.
        let (tier, err) = user_facing
            .or(last_error)
            .unwrap_or((Tier::Escalation, RouteError::CircuitOpen(Tier::Escalation)));
        decision(query, start, reason, started, attempts, tier, Err(err))
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_with_retry(
        &self,
        tier: Tier,
        kind: QueryKind,
        query: &ClassifiedQuery,
        student: &StudentContext,
        graph: &PrerequisiteGraph,
        facts: &[String],
        gate: &dyn TierGate,
        attempts: &mut Vec<Attempt>,
    ) -> Result<Answer, RouteError> {
        let mut retries = 0;
        loop {
            let began = Instant::now();
            let result = self.attempt(tier, kind, query, student, graph, facts).await;
            let elapsed = began.elapsed();
            gate.record(tier, TierOutcome::of(&result), elapsed);
            attempts.push(Attempt::finished(tier, kind, &result, elapsed));

            match result {
                Err(err)
                    if err.class() == FailureClass::Retryable
                        && retries < self.config.max_retries
                        && gate.admit(tier) =>
                {
                    retries += 1;
                    tracing::debug!(tier = %tier, retries, error = %err, "Retrying transient failure");
                }
                other => return other,
            }
        }
    }

    async fn attempt(
        &self,
        tier: Tier,
        kind: QueryKind,
        query: &ClassifiedQuery,
        student: &StudentContext,
        graph: &PrerequisiteGraph,
        facts: &[String],
    ) -> Result<Answer, RouteError> {
        match tier {
            Tier::Structured => handlers::structured(self.store.as_ref(), kind, query, student).await,
            Tier::RuleBased => {
                handlers::rule_based(
                    self.store.as_ref(),
                    graph,
                    kind,
                    query,
                    student,
                    self.per_semester_cap,
                )
                .await
            }
            Tier::Escalation => self.escalate(query, facts).await,
        }
    }

    async fn escalate(&self, query: &ClassifiedQuery, facts: &[String]) -> Result<Answer, RouteError> {
        let Some(generator) = &self.generator else {
            return Err(RouteError::EscalationFailure(
                "no text generator configured".to_string(),
            ));
        };

        let timeout = self.config.escalation_timeout();
        match tokio::time::timeout(timeout, generator.generate(&query.text, facts)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(Answer::Generated { text }),
            Ok(Ok(_)) => Err(RouteError::EscalationFailure("empty response".to_string())),
            Ok(Err(e)) => Err(RouteError::EscalationFailure(e.to_string())),
            Err(_) => Err(RouteError::EscalationFailure(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// The kind a tier answers: the first matched kind it handles, else the primary.
fn kind_for(tier: Tier, query: &ClassifiedQuery) -> QueryKind {
    if tier == Tier::Escalation {
        return query.kind;
    }
    query
        .matched
        .iter()
        .copied()
        .find(|kind| tier.handles(*kind))
        .unwrap_or(query.kind)
}

fn decision(
    query: &ClassifiedQuery,
    start: Tier,
    reason: String,
    started: Instant,
    attempts: Vec<Attempt>,
    tier: Tier,
    outcome: Result<Answer, RouteError>,
) -> RoutingDecision {
    let rationale = if tier == start {
        reason
    } else {
        format!("{reason}; settled at the {tier} tier after {} attempts", attempts.len())
    };
    let elapsed = started.elapsed();
    tracing::debug!(
        kind = %query.kind,
        tier = %tier,
        success = outcome.is_ok(),
        attempts = attempts.len(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Routing finished"
    );
    RoutingDecision {
        kind: query.kind,
        tier: Some(tier),
        rationale,
        elapsed,
        attempts,
        outcome,
    }
}

/// Catalog facts the escalation tier is grounded on.
fn grounding_facts(
    query: &ClassifiedQuery,
    student: &StudentContext,
    graph: &PrerequisiteGraph,
) -> Vec<String> {
    let mut facts = Vec::new();
    for code in &query.entities.courses {
        let Some(course) = graph.course(code) else {
            facts.push(format!("{code} is not in the course catalog"));
            continue;
        };
        let mut fact = format!("{} {} ({} credits)", course.code, course.title, course.credits);
        if !course.description.is_empty() {
            fact.push_str(": ");
            fact.push_str(&course.description);
        }
        facts.push(fact);

        if let Ok(requirements) = graph.prerequisites_of(code) {
            if !requirements.is_empty() {
                let listed: Vec<String> = requirements.iter().map(ToString::to_string).collect();
                facts.push(format!("{code} requires {}", listed.join(", ")));
            }
        }
    }
    for track in &query.entities.tracks {
        facts.push(format!("The question mentions the {track} track"));
    }
    if let Some(year) = query.entities.year.or(student.year) {
        facts.push(format!("The student is a {}", year.as_str()));
    }
    if !student.completed.is_empty() {
        let done: Vec<&str> = student.completed.iter().map(CourseCode::as_str).collect();
        facts.push(format!("The student has completed {}", done.join(", ")));
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiError;
    use crate::catalog::{sample_catalog, CodeTable, MemoryStore};
    use crate::classify::Classifier;
    use crate::graph::GraphPolicy;
    use crate::router::{AttemptOutcome, OpenGate};
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str, facts: &[String]) -> Result<String, AiError> {
            Ok(format!("{prompt} [{}]", facts.join("; ")))
        }
    }

    fn setup() -> (Router, PrerequisiteGraph, Classifier) {
        let catalog = sample_catalog();
        let graph = PrerequisiteGraph::from_catalog(&catalog, GraphPolicy::default());
        let classifier =
            Classifier::with_default_rules(Arc::new(CodeTable::default()), &catalog.tracks);
        let router = Router::new(RouterConfig::default(), Arc::new(MemoryStore::new(catalog)))
            .with_generator(Arc::new(EchoGenerator));
        (router, graph, classifier)
    }

    #[tokio::test]
    async fn test_course_info_answered_by_structured_tier() {
        let (router, graph, classifier) = setup();
        let query = classifier.classify("CS 182");
        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        assert_eq!(decision.tier, Some(Tier::Structured));
        assert!(decision.success());
        assert_eq!(decision.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_starts_at_escalation() {
        let (router, graph, classifier) = setup();
        let query = classifier.classify("asdf qwerty");
        let (start, reason) = router.starting_tier(&query);
        assert_eq!(start, Tier::Escalation);
        assert!(reason.contains("below threshold"));

        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        assert!(matches!(decision.outcome, Ok(Answer::Generated { .. })));
    }

    #[tokio::test]
    async fn test_unknown_course_falls_back_to_escalation_with_fact() {
        let (router, graph, classifier) = setup();
        let query = classifier.classify("tell me about CS 99900");
        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        let tiers: Vec<Tier> = decision.attempts.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![Tier::Structured, Tier::RuleBased, Tier::Escalation]);
        let Ok(Answer::Generated { text }) = &decision.outcome else {
            panic!("expected generated answer");
        };
        assert!(text.contains("CS 99900 is not in the course catalog"));
    }

    #[tokio::test]
    async fn test_not_found_reported_when_escalation_unavailable() {
        let catalog = sample_catalog();
        let graph = PrerequisiteGraph::from_catalog(&catalog, GraphPolicy::default());
        let classifier =
            Classifier::with_default_rules(Arc::new(CodeTable::default()), &catalog.tracks);
        let router = Router::new(RouterConfig::default(), Arc::new(MemoryStore::new(catalog)));

        let query = classifier.classify("tell me about CS 99900");
        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        assert_eq!(decision.outcome, Err(RouteError::NotFound("CS 99900".into())));
        assert_eq!(decision.attempts.last().map(|a| a.outcome), Some(AttemptOutcome::FailedTerminal));
    }

    #[tokio::test]
    async fn test_ambiguous_track_jumps_to_escalation() {
        let (router, graph, classifier) = setup();
        let query = classifier.classify("required courses for MI and SE tracks");
        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        let tiers: Vec<Tier> = decision.attempts.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![Tier::Structured, Tier::Escalation]);
        let Ok(Answer::Generated { text }) = &decision.outcome else {
            panic!("expected generated answer");
        };
        assert!(text.contains("Possible matches: machine_intelligence, software_engineering"));
    }

    #[tokio::test]
    async fn test_prerequisites_start_at_rule_tier() {
        let (router, graph, classifier) = setup();
        let query = classifier.classify("what are the prerequisites for CS 25200");
        let decision = router
            .route(&query, &StudentContext::default(), &graph, &OpenGate)
            .await;
        assert_eq!(decision.tier, Some(Tier::RuleBased));
        assert!(matches!(decision.outcome, Ok(Answer::Prerequisites { .. })));
    }

    #[test]
    fn test_facts_include_requirements_and_history() {
        let (_, graph, classifier) = setup();
        let query = classifier.classify("Is CS 25200 hard?");
        let student = StudentContext {
            completed: [CourseCode::new("CS", 18000)].into_iter().collect(),
            ..StudentContext::default()
        };
        let facts = grounding_facts(&query, &student, &graph);
        assert!(facts[0].starts_with("CS 25200 Systems Programming"));
        assert!(facts.iter().any(|f| f.starts_with("CS 25200 requires")));
        assert!(facts.iter().any(|f| f == "The student has completed CS 18000"));
    }
}

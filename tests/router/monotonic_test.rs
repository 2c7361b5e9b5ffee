//! Tier preference: the least-inference tier that can answer does.

use std::sync::Arc;

use course_advisor::catalog::sample_catalog;
use course_advisor::router::{StudentContext, Tier};

use super::fakes::{sample_engine, CannedGenerator};

const QUESTIONS: &[&str] = &[
    "CS 182",
    "tell me about CS 251",
    "what are the track requirements for machine intelligence",
    "What is the minimum GPA to CODO into CS?",
    "how many courses should a freshman take",
    "what are the prerequisites for CS 381",
    "what is the longest chain of prerequisites for CS 407",
    "what happens if I fail CS 250",
    "what comes after CS 240",
    "roadmap for the software engineering track",
    "how do track A and track B compare for career goals",
    "Is CS 25200 hard?",
];

#[tokio::test]
async fn healthy_engine_answers_at_the_starting_tier() {
    let engine = sample_engine(Some(Arc::new(CannedGenerator::default()))).await;
    let student = StudentContext::default();

    for question in QUESTIONS {
        let query = engine.classify(question);
        let (start, _) = engine.router().starting_tier(&query);
        let (_, decision) = engine.decide(question, &student).await;

        assert!(decision.success(), "{question}: {:?}", decision.outcome);
        assert_eq!(decision.tier, Some(start), "{question}");
        assert_eq!(decision.attempts.len(), 1, "{question}");
    }
}

#[tokio::test]
async fn structured_beats_rule_tier_when_both_could_answer() {
    let engine = sample_engine(Some(Arc::new(CannedGenerator::default()))).await;
    let question = "tell me about CS 252, what are its prerequisites";

    let query = engine.classify(question);
    assert!(query.matched.len() > 1, "{:?}", query.matched);
    let response = engine.ask(question, &StudentContext::default()).await;
    assert_eq!(response.tier, Some(Tier::Structured));
}

#[tokio::test]
async fn attempts_never_move_to_a_lower_inference_tier() {
    let engine = sample_engine(None).await;
    let student = StudentContext::default();
    let codes: Vec<String> = sample_catalog()
        .courses
        .iter()
        .map(|c| c.code.to_string())
        .chain(["CS 99900".to_string()])
        .collect();

    for code in codes {
        for template in ["tell me about {}", "prerequisites for {}", "can I take {}"] {
            let question = template.replace("{}", &code);
            let (_, decision) = engine.decide(&question, &student).await;
            let tiers: Vec<Tier> = decision.attempts.iter().map(|a| a.tier).collect();
            assert!(
                tiers.windows(2).all(|w| w[0] <= w[1]),
                "{question}: {tiers:?}"
            );
        }
    }
}

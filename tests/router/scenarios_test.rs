//! Worked advising scenarios, end to end.

use std::collections::BTreeSet;
use std::sync::Arc;

use course_advisor::catalog::{
    Catalog, Course, CourseCategory, CourseCode, MemoryStore, PrerequisiteEdge, Track,
};
use course_advisor::classify::QueryKind;
use course_advisor::config::AdvisorConfig;
use course_advisor::router::{Answer, StudentContext, Tier};

use super::fakes::{engine_over, sample_engine, CannedGenerator};

fn cs(number: u32) -> CourseCode {
    CourseCode::new("CS", number)
}

#[tokio::test]
async fn legacy_short_code_resolves_to_its_own_course() {
    let engine = sample_engine(None).await;
    let response = engine.ask("CS 182", &StudentContext::default()).await;

    assert!(response.success);
    assert_eq!(response.kind, QueryKind::CourseInfo);
    assert_eq!(response.tier, Some(Tier::Structured));
    let Some(Answer::Courses { courses }) = response.data else {
        panic!("expected a course answer, got {:?}", response.data);
    };
    let codes: Vec<&CourseCode> = courses.iter().map(|c| &c.code).collect();
    assert_eq!(codes, vec![&cs(18200)]);
    assert!(!response.answer.contains("CS 18000"));
}

#[tokio::test]
async fn systems_programming_prerequisites_and_closure() {
    let engine = sample_engine(None).await;
    let response = engine
        .ask("What are the prerequisites for CS 252?", &StudentContext::default())
        .await;

    assert_eq!(response.tier, Some(Tier::RuleBased));
    let Some(Answer::Prerequisites { course, direct, all }) = response.data else {
        panic!("expected prerequisites, got {:?}", response.data);
    };
    assert_eq!(course, cs(25200));
    let direct: BTreeSet<CourseCode> = direct
        .iter()
        .flat_map(|r| r.courses().to_vec())
        .collect();
    assert_eq!(direct, BTreeSet::from([cs(25000), cs(25100)]));
    assert!(all.contains(&cs(18000)));
    assert!(all.contains(&CourseCode::new("MA", 16100)));
}

#[tokio::test]
async fn cyclic_catalog_roadmap_reports_integrity_problem() {
    let (a, b) = (cs(10000), cs(20000));
    let stub = |code: &CourseCode| Course {
        code: code.clone(),
        title: format!("Course {code}"),
        credits: 3,
        category: CourseCategory::Track,
        description: String::new(),
    };
    let catalog = Catalog {
        courses: vec![stub(&a), stub(&b)],
        edges: vec![
            PrerequisiteEdge::mandatory(a.clone(), b.clone()),
            PrerequisiteEdge::mandatory(b.clone(), a.clone()),
        ],
        tracks: vec![Track {
            id: "loop".to_string(),
            name: "Loop".to_string(),
            required: vec![a.clone()],
            electives: Vec::new(),
            min_electives: 0,
            aliases: Vec::new(),
        }],
        policies: Vec::new(),
    };
    let engine = engine_over(
        Arc::new(MemoryStore::new(catalog)),
        AdvisorConfig::default(),
        None,
    )
    .await;

    let report = engine.integrity_report();
    assert_eq!(report.cycles, vec![vec![a.clone(), b]]);

    let response = engine
        .ask("roadmap for the loop track", &StudentContext::default())
        .await;
    assert_eq!(response.kind, QueryKind::Roadmap);
    let Some(Answer::Roadmap { roadmap }) = &response.data else {
        panic!("expected a roadmap, got {:?}", response.data);
    };
    assert!(roadmap.semesters.is_empty());
    assert_eq!(roadmap.blocked.len(), 1);
    assert_eq!(roadmap.blocked[0].course, a);
    assert!(roadmap.blocked[0].error.is_integrity());
    assert!(response.answer.contains("catalog data problem"));
    assert!(!response.answer.contains("->"));
}

#[tokio::test]
async fn track_comparison_goes_to_escalation() {
    let generator = Arc::new(CannedGenerator::default());
    let engine = sample_engine(Some(generator.clone())).await;

    let response = engine
        .ask(
            "how do track A and track B compare for career goals",
            &StudentContext::default(),
        )
        .await;

    assert_eq!(response.kind, QueryKind::Comparison);
    assert_eq!(response.tier, Some(Tier::Escalation));
    assert_eq!(response.answer, CannedGenerator::ANSWER);
    assert_eq!(response.attempts.len(), 1);
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn escalation_is_grounded_on_student_history() {
    let generator = Arc::new(CannedGenerator::default());
    let engine = sample_engine(Some(generator.clone())).await;
    let student = StudentContext {
        completed: BTreeSet::from([cs(18000)]),
        ..StudentContext::default()
    };

    engine
        .ask("Is CS 25200 worth it compared to CS 25100?", &student)
        .await;

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let facts = &calls[0].1;
    assert!(facts.iter().any(|f| f.starts_with("CS 25200 Systems Programming")));
    assert!(facts.iter().any(|f| f == "The student has completed CS 18000"));
}

#[tokio::test]
async fn eligibility_counts_other_mentions_as_completed() {
    let engine = sample_engine(None).await;
    let response = engine
        .ask(
            "Can I take CS 25200 after CS 25000 and CS 25100?",
            &StudentContext::default(),
        )
        .await;

    assert_eq!(response.tier, Some(Tier::RuleBased));
    let Some(Answer::Eligibility { eligibility }) = response.data else {
        panic!("expected eligibility, got {:?}", response.data);
    };
    assert!(eligibility.eligible);
    assert!(response.answer.starts_with("Yes"));
}

//! Integration tests for the prerequisite graph over the sample catalog.

use std::collections::BTreeSet;

use course_advisor::catalog::{
    sample_catalog, Course, CourseCategory, CourseCode, PrerequisiteEdge, Track,
};
use course_advisor::graph::{GraphError, GraphPolicy, PrerequisiteGraph};

fn cs(number: u32) -> CourseCode {
    CourseCode::new("CS", number)
}

fn sample_graph() -> PrerequisiteGraph {
    PrerequisiteGraph::from_catalog(&sample_catalog(), GraphPolicy::default())
}

/// Closure computed by repeatedly expanding direct requirements.
fn fixed_point(graph: &PrerequisiteGraph, course: &CourseCode) -> BTreeSet<CourseCode> {
    let mut closure = BTreeSet::new();
    let mut frontier = vec![course.clone()];
    while let Some(next) = frontier.pop() {
        for requirement in graph.prerequisites_of(&next).expect("known course") {
            for required in requirement.courses() {
                if closure.insert(required.clone()) {
                    frontier.push(required.clone());
                }
            }
        }
    }
    closure
}

#[test]
fn closure_matches_fixed_point_for_every_course() {
    let graph = sample_graph();
    for course in sample_catalog().courses {
        let closure = graph
            .all_prerequisites_of(&course.code)
            .expect("sample catalog is acyclic");
        assert_eq!(closure, fixed_point(&graph, &course.code), "{}", course.code);
    }
}

#[test]
fn systems_programming_closure() {
    let graph = sample_graph();
    let closure = graph.all_prerequisites_of(&cs(25200)).unwrap();
    for expected in [
        cs(25000),
        cs(25100),
        cs(18200),
        cs(24000),
        cs(18000),
        CourseCode::new("MA", 16100),
    ] {
        assert!(closure.contains(&expected), "missing {expected}");
    }
    assert!(!closure.contains(&cs(25200)));
}

#[test]
fn cycle_error_agrees_with_detect_cycles() {
    let (a, b, c) = (cs(10000), cs(20000), cs(30000));
    let stub = |code: &CourseCode| Course {
        code: code.clone(),
        title: code.to_string(),
        credits: 3,
        category: CourseCategory::Elective,
        description: String::new(),
    };
    let graph = PrerequisiteGraph::build(
        vec![stub(&a), stub(&b), stub(&c)],
        vec![
            PrerequisiteEdge::mandatory(a.clone(), b.clone()),
            PrerequisiteEdge::mandatory(b.clone(), a.clone()),
            PrerequisiteEdge::mandatory(c.clone(), a.clone()),
        ],
        GraphPolicy::default(),
    );

    assert_eq!(graph.detect_cycles().len(), 1);
    assert_eq!(graph.detect_cycles()[0].len(), 2);
    let Err(GraphError::Cycle(cycle)) = graph.all_prerequisites_of(&c) else {
        panic!("expected a cycle error");
    };
    assert!(graph.detect_cycles().contains(&cycle));
}

#[test]
fn fresh_student_roadmap_respects_prerequisites() {
    let catalog = sample_catalog();
    let graph = PrerequisiteGraph::from_catalog(&catalog, GraphPolicy::default());
    let track: &Track = catalog
        .tracks
        .iter()
        .find(|t| t.id == "software_engineering")
        .expect("sample track");

    let roadmap = graph.roadmap(track, &BTreeSet::new(), 3);
    assert!(roadmap.blocked.is_empty());
    assert!(roadmap.is_complete());

    let mut done = BTreeSet::new();
    for semester in &roadmap.semesters {
        assert!(semester.courses.len() <= 3);
        for course in &semester.courses {
            assert!(
                graph.can_take(course, &done).unwrap_or(false),
                "{course} scheduled before its prerequisites"
            );
        }
        done.extend(semester.courses.iter().cloned());
    }
    for required in &track.required {
        assert!(done.contains(required), "{required} never scheduled");
    }
}

#[test]
fn failing_foundations_blocks_most_of_the_program() {
    let graph = sample_graph();
    let impact = graph.failure_impact(&cs(18000)).unwrap();
    assert!(impact.blocked.contains(&cs(25200)));
    assert!(impact.blocked.contains(&cs(47100)));
    assert!(impact.delay_semesters >= 4);
}

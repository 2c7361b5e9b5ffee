//! Renders routing decisions into user-facing responses.
//!
//! Failure text is fixed per error class; error details stay in the logs.

use std::fmt::Write as _;

use serde::Serialize;

use crate::catalog::{CourseCode, PolicySet};
use crate::classify::QueryKind;
use crate::graph::Roadmap;
use crate::router::{Answer, Attempt, AttemptOutcome, RouteError, RoutingDecision, Tier};

/// Reply for failures the user cannot act on.
pub const APOLOGY: &str =
    "Sorry, I can't answer that right now. Please try again later or contact an academic advisor.";

/// The payload returned to the asker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisorResponse {
    pub answer: String,
    pub kind: QueryKind,
    pub tier: Option<Tier>,
    pub confidence: f64,
    pub success: bool,
    /// A lower tier than preferred answered, or nothing did.
    pub degraded: bool,
    pub data: Option<Answer>,
    pub rationale: String,
    pub attempts: Vec<Attempt>,
    pub elapsed_ms: u64,
}

/// Build the response for a routing decision.
#[must_use]
pub fn compose(decision: &RoutingDecision) -> AdvisorResponse {
    let answer = match &decision.outcome {
        Ok(answer) => render(answer),
        Err(err) => render_failure(err),
    };
    let degraded = !decision.success()
        || decision
            .attempts
            .iter()
            .any(|a| a.outcome != AttemptOutcome::Succeeded);

    AdvisorResponse {
        answer,
        kind: decision.kind,
        tier: decision.tier,
        confidence: decision.confidence(),
        success: decision.success(),
        degraded,
        data: decision.outcome.as_ref().ok().cloned(),
        rationale: decision.rationale.clone(),
        attempts: decision.attempts.clone(),
        elapsed_ms: u64::try_from(decision.elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}

fn render_failure(err: &RouteError) -> String {
    match err {
        RouteError::NotFound(what) => format!(
            "I couldn't find {what} in the catalog. Please check the course code or track name."
        ),
        RouteError::AmbiguousInput { candidates } if !candidates.is_empty() => {
            format!("Which did you mean: {}?", candidates.join(", "))
        }
        RouteError::AmbiguousInput { .. } => {
            "Could you name the course or track you're asking about?".to_string()
        }
        other => {
            tracing::debug!(error = %other, "Rendering failure as apology");
            APOLOGY.to_string()
        }
    }
}

/// Plain-text rendering of a successful answer.
#[must_use]
pub fn render(answer: &Answer) -> String {
    match answer {
        Answer::Courses { courses } => courses
            .iter()
            .map(|c| {
                let mut line = format!("{}: {} ({} credits).", c.code, c.title, c.credits);
                if !c.description.is_empty() {
                    line.push(' ');
                    line.push_str(&c.description);
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Answer::Track { track } => {
            let mut text = format!(
                "The {} track requires {}.",
                track.name,
                join_codes(&track.required)
            );
            if track.min_electives > 0 && !track.electives.is_empty() {
                let _ = write!(
                    text,
                    " Choose at least {} elective(s) from {}.",
                    track.min_electives,
                    join_codes(&track.electives)
                );
            }
            text
        }
        Answer::Policies { policies } => render_policies(policies),
        Answer::Prerequisites { course, direct, all } => {
            if direct.is_empty() {
                return format!("{course} has no prerequisites.");
            }
            let listed: Vec<String> = direct.iter().map(ToString::to_string).collect();
            let mut text = format!("{course} requires {}.", listed.join(", "));
            let indirect: Vec<CourseCode> = all
                .iter()
                .filter(|c| !direct.iter().any(|r| r.courses().contains(*c)))
                .cloned()
                .collect();
            if !indirect.is_empty() {
                let _ = write!(text, " Indirectly it also needs {}.", join_codes(&indirect));
            }
            text
        }
        Answer::Chain { course, chain } => {
            if chain.len() <= 1 {
                return format!("{course} has no prerequisite chain; it can be taken first.");
            }
            let path: Vec<&str> = chain.iter().map(CourseCode::as_str).collect();
            format!(
                "The longest prerequisite chain to {course} is {} ({} semesters).",
                path.join(" -> "),
                chain.len()
            )
        }
        Answer::Eligibility { eligibility } => {
            let course = &eligibility.course;
            let mut text = if eligibility.eligible {
                format!("Yes, you can take {course}.")
            } else {
                let mut reasons = Vec::new();
                let mut conflicts = Vec::new();
                if !eligibility.missing.is_empty() {
                    reasons.push(format!("complete {}", join_codes(&eligibility.missing)));
                }
                for group in &eligibility.unsatisfied_groups {
                    let options: Vec<&str> = group.options.iter().map(CourseCode::as_str).collect();
                    if group.completed.len() > 1 {
                        conflicts.push(format!(
                            "Only one of {} may count toward {course}, but you completed {}.",
                            options.join(" or "),
                            join_codes(&group.completed)
                        ));
                    } else {
                        reasons.push(format!("complete one of {}", options.join(" or ")));
                    }
                }
                let mut text = if reasons.is_empty() {
                    "No.".to_string()
                } else {
                    format!("Not yet. Before {course} you need to {}.", reasons.join(" and "))
                };
                for conflict in conflicts {
                    let _ = write!(text, " {conflict}");
                }
                text
            };
            if !eligibility.take_with.is_empty() {
                let _ = write!(
                    text,
                    " Take {} alongside it.",
                    join_codes(&eligibility.take_with)
                );
            }
            text
        }
        Answer::FailureImpact { impact } => {
            if impact.blocked.is_empty() {
                return format!("Failing {} does not block any other course.", impact.course);
            }
            format!(
                "Failing {} would block {} course(s): {}. It could delay later courses by up to {} semester(s).",
                impact.course,
                impact.blocked.len(),
                join_codes(&impact.blocked),
                impact.delay_semesters
            )
        }
        Answer::Sequence {
            course,
            unlocks,
            now_eligible,
        } => {
            if unlocks.is_empty() {
                return format!("{course} is not a prerequisite for any other course.");
            }
            let mut text = format!("Completing {course} leads to {}.", join_codes(unlocks));
            if !now_eligible.is_empty() {
                let _ = write!(
                    text,
                    " You could take {} right after.",
                    join_codes(now_eligible)
                );
            }
            text
        }
        Answer::Roadmap { roadmap } => render_roadmap(roadmap),
        Answer::Generated { text } => text.clone(),
    }
}

fn render_policies(policies: &[PolicySet]) -> String {
    let mut text = String::new();
    for set in policies {
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = writeln!(text, "{}:", set.scope);
        for rule in &set.rules {
            let label = if rule.description.is_empty() {
                rule.key.as_str()
            } else {
                rule.description.as_str()
            };
            let _ = writeln!(text, "- {label}: {}", rule.value);
        }
    }
    text.trim_end().to_string()
}

fn render_roadmap(roadmap: &Roadmap) -> String {
    if roadmap.semesters.is_empty() && roadmap.is_complete() {
        return format!("You have already completed the {} track.", roadmap.track);
    }
    let mut text = format!("Plan for the {} track:", roadmap.track);
    for semester in &roadmap.semesters {
        let _ = write!(
            text,
            "\nSemester {}: {}",
            semester.number,
            join_codes(&semester.courses)
        );
    }
    if roadmap.electives_short > 0 {
        let _ = write!(
            text,
            "\n{} more elective(s) are needed that could not be planned.",
            roadmap.electives_short
        );
    }
    if !roadmap.blocked.is_empty() {
        let blocked: Vec<CourseCode> = roadmap.blocked.iter().map(|b| b.course.clone()).collect();
        let _ = write!(
            text,
            "\nCould not schedule {} because of a catalog data problem; please check with an advisor.",
            join_codes(&blocked)
        );
    }
    text
}

fn join_codes(codes: &[CourseCode]) -> String {
    codes
        .iter()
        .map(CourseCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Per-tier answer handlers.

use std::collections::BTreeSet;

use super::{Answer, RouteError, StudentContext, Tier};
use crate::catalog::{CourseCode, KnowledgeStore, PolicyScope, ScopeKind};
use crate::classify::{ClassifiedQuery, QueryKind, YearLevel, DEFAULT_PROGRAM};
use crate::graph::PrerequisiteGraph;

/// Answer `kind` with direct store reads.
pub(super) async fn structured(
    store: &dyn KnowledgeStore,
    kind: QueryKind,
    query: &ClassifiedQuery,
    student: &StudentContext,
) -> Result<Answer, RouteError> {
    match kind {
        QueryKind::CourseInfo => {
            let codes = mentioned_courses(query)?;
            let mut courses = Vec::with_capacity(codes.len());
            for code in codes {
                let course = store
                    .get_course(code)
                    .await?
                    .ok_or_else(|| RouteError::NotFound(code.to_string()))?;
                courses.push(course);
            }
            Ok(Answer::Courses { courses })
        }
        QueryKind::TrackRequirements => {
            let id = resolve_track(store, query, student).await?;
            let track = store
                .get_track(&id)
                .await?
                .ok_or(RouteError::NotFound(id))?;
            Ok(Answer::Track { track })
        }
        QueryKind::Policy => {
            let scope = query
                .entities
                .scope
                .clone()
                .unwrap_or_else(|| PolicyScope::new(ScopeKind::Major, DEFAULT_PROGRAM));
            let set = store
                .get_policy(&scope)
                .await?
                .ok_or_else(|| RouteError::NotFound(scope.to_string()))?;
            Ok(Answer::Policies {
                policies: vec![set],
            })
        }
        QueryKind::CourseLoad => {
            let scopes: Vec<PolicyScope> = match (&query.entities.scope, student.year) {
                (Some(scope), _) => vec![scope.clone()],
                (None, Some(year)) => vec![PolicyScope::new(ScopeKind::CourseLoad, year.as_str())],
                (None, None) => YearLevel::ALL
                    .iter()
                    .map(|year| PolicyScope::new(ScopeKind::CourseLoad, year.as_str()))
                    .collect(),
            };
            let mut policies = Vec::new();
            for scope in &scopes {
                if let Some(set) = store.get_policy(scope).await? {
                    policies.push(set);
                }
            }
            if policies.is_empty() {
                return Err(RouteError::NotFound("course load guidance".to_string()));
            }
            Ok(Answer::Policies { policies })
        }
        other => Err(RouteError::Unsupported {
            tier: Tier::Structured,
            kind: other,
        }),
    }
}

/// Answer `kind` by derivation over the prerequisite graph.
pub(super) async fn rule_based(
    store: &dyn KnowledgeStore,
    graph: &PrerequisiteGraph,
    kind: QueryKind,
    query: &ClassifiedQuery,
    student: &StudentContext,
    per_semester_cap: usize,
) -> Result<Answer, RouteError> {
    match kind {
        QueryKind::CourseInfo => {
            let courses = mentioned_courses(query)?
                .iter()
                .map(|code| {
                    graph
                        .course(code)
                        .cloned()
                        .ok_or_else(|| RouteError::NotFound(code.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Answer::Courses { courses })
        }
        QueryKind::Prerequisites => {
            let course = target(query)?;
            let direct = graph.prerequisites_of(course)?;
            let all = graph.all_prerequisites_of(course)?.into_iter().collect();
            Ok(Answer::Prerequisites {
                course: course.clone(),
                direct,
                all,
            })
        }
        QueryKind::PrerequisiteChain => {
            let course = target(query)?;
            Ok(Answer::Chain {
                course: course.clone(),
                chain: graph.longest_chain(course)?,
            })
        }
        QueryKind::Eligibility => {
            let course = target(query)?;
            let completed = completed_with_mentions(query, student, Some(course));
            Ok(Answer::Eligibility {
                eligibility: graph.eligibility(course, &completed)?,
            })
        }
        QueryKind::FailureImpact => {
            let course = target(query)?;
            Ok(Answer::FailureImpact {
                impact: graph.failure_impact(course)?,
            })
        }
        QueryKind::CourseSequence => {
            let course = target(query)?;
            let unlocks = graph.dependents_of(course)?;
            let mut completed = completed_with_mentions(query, student, None);
            completed.insert(course.clone());
            let mut now_eligible = Vec::new();
            for next in &unlocks {
                if !completed.contains(next) && graph.can_take(next, &completed)? {
                    now_eligible.push(next.clone());
                }
            }
            Ok(Answer::Sequence {
                course: course.clone(),
                unlocks,
                now_eligible,
            })
        }
        QueryKind::Roadmap => {
            let id = resolve_track(store, query, student).await?;
            let track = store
                .get_track(&id)
                .await?
                .ok_or(RouteError::NotFound(id))?;
            let completed = completed_with_mentions(query, student, None);
            Ok(Answer::Roadmap {
                roadmap: graph.roadmap(&track, &completed, per_semester_cap),
            })
        }
        other => Err(RouteError::Unsupported {
            tier: Tier::RuleBased,
            kind: other,
        }),
    }
}

fn mentioned_courses(query: &ClassifiedQuery) -> Result<&[CourseCode], RouteError> {
    if query.entities.courses.is_empty() {
        return Err(RouteError::AmbiguousInput {
            candidates: Vec::new(),
        });
    }
    Ok(&query.entities.courses)
}

/// The course a graph question is about: the first one mentioned.
fn target(query: &ClassifiedQuery) -> Result<&CourseCode, RouteError> {
    query
        .entities
        .courses
        .first()
        .ok_or_else(|| RouteError::AmbiguousInput {
            candidates: Vec::new(),
        })
}

/// The student's completed courses plus every mentioned course except `except`.
fn completed_with_mentions(
    query: &ClassifiedQuery,
    student: &StudentContext,
    except: Option<&CourseCode>,
) -> BTreeSet<CourseCode> {
    let mut completed = student.completed.clone();
    completed.extend(
        query
            .entities
            .courses
            .iter()
            .filter(|code| Some(*code) != except)
            .cloned(),
    );
    completed
}

/// Pick the single track a question is about.
async fn resolve_track(
    store: &dyn KnowledgeStore,
    query: &ClassifiedQuery,
    student: &StudentContext,
) -> Result<String, RouteError> {
    match query.entities.tracks.as_slice() {
        [id] => Ok(id.clone()),
        [] => match &student.track {
            Some(id) => Ok(id.clone()),
            None => {
                let candidates = store
                    .list_tracks()
                    .await?
                    .into_iter()
                    .map(|track| track.name)
                    .collect();
                Err(RouteError::AmbiguousInput { candidates })
            }
        },
        many => Err(RouteError::AmbiguousInput {
            candidates: many.to_vec(),
        }),
    }
}

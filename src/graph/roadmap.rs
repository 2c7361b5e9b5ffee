//! Greedy semester planning over the prerequisite graph.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use serde::{Serialize, Serializer};

use super::{GraphError, PrerequisiteGraph, Requirement};
use crate::catalog::{CourseCode, Track};

/// Courses scheduled for one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Semester {
    pub number: usize,
    pub courses: Vec<CourseCode>,
}

/// A course the planner could not schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedCourse {
    pub course: CourseCode,
    #[serde(serialize_with = "serialize_display")]
    pub error: GraphError,
}

/// A semester-by-semester plan for finishing a track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roadmap {
    pub track: String,
    pub semesters: Vec<Semester>,
    /// Electives picked to reach the track minimum.
    pub electives: Vec<CourseCode>,
    /// Electives still needed that no clean candidate could cover.
    pub electives_short: usize,
    pub blocked: Vec<BlockedCourse>,
}

impl Roadmap {
    /// Whether every requirement was scheduled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.blocked.is_empty() && self.electives_short == 0
    }

    /// Every scheduled course, in semester order.
    pub fn scheduled(&self) -> impl Iterator<Item = &CourseCode> {
        self.semesters.iter().flat_map(|s| s.courses.iter())
    }
}

fn serialize_display<S: Serializer>(error: &GraphError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl PrerequisiteGraph {
    /// Plan the remaining courses of `track` at most `per_semester_cap` at a time.
    ///
    /// The plan covers the track's required courses, enough electives to reach
    /// its minimum, and any missing prerequisites of those. Courses that touch a
    /// cycle or a dangling edge are reported in [`Roadmap::blocked`] instead of
    /// being scheduled, as are courses left over when no further progress is
    /// possible.
    #[must_use]
    pub fn roadmap(
        &self,
        track: &Track,
        completed: &BTreeSet<CourseCode>,
        per_semester_cap: usize,
    ) -> Roadmap {
        let cap = per_semester_cap.max(1);
        let mut blocked = Vec::new();
        let mut plan = BTreeSet::new();
        let mut required = BTreeSet::new();

        for course in track.required.iter().filter(|c| !completed.contains(*c)) {
            match self.extend_plan(course, completed, &mut plan) {
                Ok(()) => {
                    required.insert(course.clone());
                }
                Err(error) => {
                    tracing::warn!(course = %course, %error, "Track course cannot be planned");
                    blocked.push(BlockedCourse {
                        course: course.clone(),
                        error,
                    });
                }
            }
        }

        let electives_done = track
            .electives
            .iter()
            .filter(|c| completed.contains(*c))
            .count();
        let mut electives_short = track.min_electives.saturating_sub(electives_done);
        let mut electives = Vec::new();
        for course in track.electives.iter().filter(|c| !completed.contains(*c)) {
            if electives_short == 0 {
                break;
            }
            match self.extend_plan(course, completed, &mut plan) {
                Ok(()) => {
                    electives.push(course.clone());
                    electives_short -= 1;
                }
                Err(error) => tracing::debug!(course = %course, %error, "Skipping elective"),
            }
        }

        // Courses on the way to a required course go first.
        let on_required_path: BTreeSet<CourseCode> = required
            .iter()
            .filter_map(|c| self.all_prerequisites_of(c).ok())
            .flatten()
            .chain(required.iter().cloned())
            .collect();
        let mut depth_memo = HashMap::new();
        let depths: HashMap<CourseCode, usize> = plan
            .iter()
            .map(|c| (c.clone(), self.depth_within(c, &plan, &mut depth_memo)))
            .collect();

        let rank = |c: &CourseCode| {
            (
                !on_required_path.contains(c),
                Reverse(depths.get(c).copied().unwrap_or(0)),
            )
        };

        let mut done = completed.clone();
        let mut remaining = plan;
        let mut semesters = Vec::new();
        while !remaining.is_empty() {
            let eligible: BTreeSet<&CourseCode> = remaining
                .iter()
                .filter(|c| self.can_take(c, &done).unwrap_or(false))
                .collect();
            let mut ordered: Vec<&CourseCode> = eligible.iter().copied().collect();
            ordered.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));

            // A course enters a semester together with its untaken corequisites.
            let mut picked: Vec<CourseCode> = Vec::new();
            for course in ordered {
                if picked.len() == cap {
                    break;
                }
                if picked.contains(course) {
                    continue;
                }
                let Some(group) = self.corequisite_group(course, &done, &eligible) else {
                    continue;
                };
                let joining: Vec<CourseCode> =
                    group.into_iter().filter(|c| !picked.contains(c)).collect();
                if picked.len() + joining.len() <= cap {
                    picked.extend(joining);
                }
            }
            if picked.is_empty() {
                break;
            }
            picked.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
            for course in &picked {
                remaining.remove(course);
                done.insert(course.clone());
            }
            semesters.push(Semester {
                number: semesters.len() + 1,
                courses: picked,
            });
        }

        for course in remaining {
            tracing::warn!(course = %course, "No progress possible; leaving course unscheduled");
            blocked.push(BlockedCourse {
                error: GraphError::Unsatisfiable(course.clone()),
                course,
            });
        }

        tracing::debug!(
            track = %track.id,
            semesters = semesters.len(),
            blocked = blocked.len(),
            "Roadmap planned"
        );

        Roadmap {
            track: track.id.clone(),
            semesters,
            electives,
            electives_short,
            blocked,
        }
    }

    /// Add `course` and its unmet prerequisites to `plan`, or leave `plan`
    /// untouched if any of them is unplannable.
    fn extend_plan(
        &self,
        course: &CourseCode,
        completed: &BTreeSet<CourseCode>,
        plan: &mut BTreeSet<CourseCode>,
    ) -> Result<(), GraphError> {
        self.all_prerequisites_of(course)?;
        let mut additions = BTreeSet::new();
        self.collect_needed(course, completed, plan, &mut additions)?;
        plan.extend(additions);
        Ok(())
    }

    /// One either-of option is enough; the smallest code is chosen when none
    /// is already taken or planned.
    fn collect_needed(
        &self,
        course: &CourseCode,
        completed: &BTreeSet<CourseCode>,
        plan: &BTreeSet<CourseCode>,
        additions: &mut BTreeSet<CourseCode>,
    ) -> Result<(), GraphError> {
        let covered = |c: &CourseCode, additions: &BTreeSet<CourseCode>| {
            completed.contains(c) || plan.contains(c) || additions.contains(c)
        };
        if covered(course, additions) {
            return Ok(());
        }
        additions.insert(course.clone());

        for requirement in self.prerequisites_of(course)? {
            match requirement {
                Requirement::Mandatory { course: required }
                | Requirement::Corequisite { course: required } => {
                    self.collect_needed(&required, completed, plan, additions)?;
                }
                Requirement::OneOf { options, .. } => {
                    if options.iter().any(|o| covered(o, additions)) {
                        continue;
                    }
                    if let Some(choice) = options.first() {
                        self.collect_needed(choice, completed, plan, additions)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `course` plus every corequisite it transitively needs alongside it, or
    /// `None` if one of them cannot be taken this semester.
    fn corequisite_group(
        &self,
        course: &CourseCode,
        done: &BTreeSet<CourseCode>,
        eligible: &BTreeSet<&CourseCode>,
    ) -> Option<Vec<CourseCode>> {
        let mut group = vec![course.clone()];
        let mut index = 0;
        while let Some(next) = group.get(index).cloned() {
            index += 1;
            let eligibility = self.eligibility(&next, done).ok()?;
            for partner in eligibility.take_with {
                if !eligible.contains(&partner) {
                    return None;
                }
                if !group.contains(&partner) {
                    group.push(partner);
                }
            }
        }
        Some(group)
    }

    /// Longest chain of planned courses that build on `course`.
    fn depth_within(
        &self,
        course: &CourseCode,
        plan: &BTreeSet<CourseCode>,
        memo: &mut HashMap<CourseCode, usize>,
    ) -> usize {
        if let Some(depth) = memo.get(course) {
            return *depth;
        }
        let depth = 1 + self
            .dependents_of(course)
            .unwrap_or_default()
            .iter()
            .filter(|d| plan.contains(*d))
            .map(|d| self.depth_within(d, plan, memo))
            .max()
            .unwrap_or(0);
        memo.insert(course.clone(), depth);
        depth
    }
}

//! In-memory prerequisite graph.
//!
//! The graph is built wholesale from the catalog's course and edge lists and
//! never mutated afterwards. Cycles and dangling edges are found once at build
//! time; every traversal checks the part of the graph it touches against those
//! findings before walking it, so no query can loop.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::GraphError;
use crate::catalog::{Catalog, Course, CourseCode, EdgeKind, PrerequisiteEdge};

/// Group label for either-of edges that carry none.
pub const DEFAULT_GROUP: &str = "any";

/// How an either-of group is satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EitherOfRule {
    /// One or more members completed.
    #[default]
    AtLeastOne,
    /// Exactly one member completed.
    ExactlyOne,
}

/// When a corequisite must be completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorequisiteRule {
    /// May be taken in the same semester; does not block enrollment.
    #[default]
    Concurrent,
    /// Must be completed beforehand, like a mandatory prerequisite.
    Before,
}

/// Enrollment semantics applied by eligibility checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphPolicy {
    pub either_of: EitherOfRule,
    pub corequisite: CorequisiteRule,
}

/// A direct requirement of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    Mandatory { course: CourseCode },
    Corequisite { course: CourseCode },
    OneOf {
        group: String,
        options: Vec<CourseCode>,
    },
}

impl Requirement {
    /// Every course named by this requirement.
    #[must_use]
    pub fn courses(&self) -> &[CourseCode] {
        match self {
            Self::Mandatory { course } | Self::Corequisite { course } => std::slice::from_ref(course),
            Self::OneOf { options, .. } => options,
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mandatory { course } => write!(f, "{course}"),
            Self::Corequisite { course } => write!(f, "{course} (corequisite)"),
            Self::OneOf { options, .. } => {
                let names: Vec<&str> = options.iter().map(CourseCode::as_str).collect();
                write!(f, "one of {}", names.join(" or "))
            }
        }
    }
}

/// An either-of group the student has not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsatisfiedGroup {
    pub group: String,
    pub options: Vec<CourseCode>,
    /// Members already completed (more than one under `ExactlyOne`).
    pub completed: Vec<CourseCode>,
}

/// Result of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub course: CourseCode,
    pub eligible: bool,
    /// Mandatory prerequisites not yet completed.
    pub missing: Vec<CourseCode>,
    pub unsatisfied_groups: Vec<UnsatisfiedGroup>,
    /// Corequisites that must be taken alongside the course.
    pub take_with: Vec<CourseCode>,
}

/// What failing a course puts at risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureImpact {
    pub course: CourseCode,
    /// Every course that transitively depends on it.
    pub blocked: Vec<CourseCode>,
    /// Courses in the longest dependent chain after it.
    pub delay_semesters: usize,
}

/// Data-integrity findings for the current graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub courses: usize,
    pub edges: usize,
    pub cycles: Vec<Vec<CourseCode>>,
    pub dangling: Vec<PrerequisiteEdge>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.dangling.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Link {
    code: CourseCode,
    kind: EdgeKind,
    group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Prerequisites,
    Dependents,
}

/// Directed graph of course dependencies.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    courses: BTreeMap<CourseCode, Course>,
    requires: BTreeMap<CourseCode, Vec<Link>>,
    required_by: BTreeMap<CourseCode, Vec<Link>>,
    edge_count: usize,
    policy: GraphPolicy,
    cycles: Vec<Vec<CourseCode>>,
    dangling: Vec<PrerequisiteEdge>,
}

impl PrerequisiteGraph {
    /// Build a graph from course and edge lists.
    ///
    /// Edges that name unknown courses are kept and reported by
    /// [`integrity_report`](Self::integrity_report). Duplicate edges are dropped.
    #[must_use]
    pub fn build(courses: Vec<Course>, edges: Vec<PrerequisiteEdge>, policy: GraphPolicy) -> Self {
        let courses: BTreeMap<CourseCode, Course> =
            courses.into_iter().map(|c| (c.code.clone(), c)).collect();

        let mut seen = HashSet::new();
        let mut requires: BTreeMap<CourseCode, Vec<Link>> = BTreeMap::new();
        let mut required_by: BTreeMap<CourseCode, Vec<Link>> = BTreeMap::new();
        let mut dangling = Vec::new();

        for edge in edges {
            if !seen.insert(edge.clone()) {
                continue;
            }
            if !courses.contains_key(&edge.course) || !courses.contains_key(&edge.required) {
                dangling.push(edge.clone());
            }
            requires.entry(edge.course.clone()).or_default().push(Link {
                code: edge.required.clone(),
                kind: edge.kind,
                group: edge.group.clone(),
            });
            required_by.entry(edge.required).or_default().push(Link {
                code: edge.course,
                kind: edge.kind,
                group: edge.group,
            });
        }
        for links in requires.values_mut().chain(required_by.values_mut()) {
            links.sort_by(|a, b| a.code.cmp(&b.code));
        }

        let cycles = CycleFinder::run(&requires);
        for cycle in &cycles {
            tracing::warn!(error = %GraphError::Cycle(cycle.clone()), "Integrity defect in catalog");
        }
        for edge in &dangling {
            tracing::warn!(
                course = %edge.course,
                required = %edge.required,
                "Prerequisite edge references an unknown course"
            );
        }

        let edge_count = seen.len();
        tracing::debug!(courses = courses.len(), edges = edge_count, "Prerequisite graph built");

        Self {
            courses,
            requires,
            required_by,
            edge_count,
            policy,
            cycles,
            dangling,
        }
    }

    /// Build a graph from a full catalog snapshot.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog, policy: GraphPolicy) -> Self {
        Self::build(catalog.courses.clone(), catalog.edges.clone(), policy)
    }

    #[must_use]
    pub fn policy(&self) -> GraphPolicy {
        self.policy
    }

    /// Number of known courses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    #[must_use]
    pub fn contains(&self, code: &CourseCode) -> bool {
        self.courses.contains_key(code)
    }

    /// Course facts for a node.
    #[must_use]
    pub fn course(&self, code: &CourseCode) -> Option<&Course> {
        self.courses.get(code)
    }

    /// All known courses in code order.
    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Cycles found at build time, each starting at its smallest code.
    #[must_use]
    pub fn detect_cycles(&self) -> &[Vec<CourseCode>] {
        &self.cycles
    }

    #[must_use]
    pub fn integrity_report(&self) -> IntegrityReport {
        IntegrityReport {
            courses: self.courses.len(),
            edges: self.edge_count,
            cycles: self.cycles.clone(),
            dangling: self.dangling.clone(),
        }
    }

    /// Direct requirements of a course. Either-of edges are grouped by label.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the course is unknown.
    pub fn prerequisites_of(&self, course: &CourseCode) -> Result<Vec<Requirement>, GraphError> {
        self.ensure_known(course)?;

        let mut requirements = Vec::new();
        let mut groups: BTreeMap<&str, Vec<CourseCode>> = BTreeMap::new();
        for link in self.links(course, Direction::Prerequisites) {
            match link.kind {
                EdgeKind::Mandatory => requirements.push(Requirement::Mandatory {
                    course: link.code.clone(),
                }),
                EdgeKind::Corequisite => requirements.push(Requirement::Corequisite {
                    course: link.code.clone(),
                }),
                EdgeKind::EitherOf => groups
                    .entry(link.group.as_deref().unwrap_or(DEFAULT_GROUP))
                    .or_default()
                    .push(link.code.clone()),
            }
        }
        requirements.extend(groups.into_iter().map(|(group, options)| Requirement::OneOf {
            group: group.to_string(),
            options,
        }));
        Ok(requirements)
    }

    /// Transitive closure of a course's requirements, corequisites included.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for an unknown course, or an integrity
    /// error if a cycle or dangling edge is reachable from it.
    pub fn all_prerequisites_of(
        &self,
        course: &CourseCode,
    ) -> Result<BTreeSet<CourseCode>, GraphError> {
        self.ensure_known(course)?;
        let closure = self.reachable(course, Direction::Prerequisites);
        self.check_integrity(course, &closure)?;
        Ok(closure)
    }

    /// Courses that list this course as a direct requirement.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the course is unknown.
    pub fn dependents_of(&self, course: &CourseCode) -> Result<Vec<CourseCode>, GraphError> {
        self.ensure_known(course)?;
        let mut dependents: Vec<CourseCode> = self
            .links(course, Direction::Dependents)
            .iter()
            .map(|l| l.code.clone())
            .collect();
        dependents.dedup();
        Ok(dependents)
    }

    /// Every course that transitively depends on this course.
    ///
    /// # Errors
    ///
    /// Same as [`all_prerequisites_of`](Self::all_prerequisites_of), looking downstream.
    pub fn all_dependents_of(&self, course: &CourseCode) -> Result<BTreeSet<CourseCode>, GraphError> {
        self.ensure_known(course)?;
        let closure = self.reachable(course, Direction::Dependents);
        self.check_integrity(course, &closure)?;
        Ok(closure)
    }

    /// The deepest prerequisite path ending at `course`, root first.
    ///
    /// Corequisites are not followed. Ties pick the smallest code.
    ///
    /// # Errors
    ///
    /// Same as [`all_prerequisites_of`](Self::all_prerequisites_of).
    pub fn longest_chain(&self, course: &CourseCode) -> Result<Vec<CourseCode>, GraphError> {
        self.all_prerequisites_of(course)?;

        let mut memo = HashMap::new();
        let mut chain = vec![course.clone()];
        let mut current = course;
        while let Some(next) = self.deepest_link(current, Direction::Prerequisites, &mut memo) {
            chain.push(next.clone());
            current = next;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Check a course against a set of completed courses.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the course is unknown.
    pub fn eligibility(
        &self,
        course: &CourseCode,
        completed: &BTreeSet<CourseCode>,
    ) -> Result<Eligibility, GraphError> {
        let mut missing = Vec::new();
        let mut unsatisfied_groups = Vec::new();
        let mut take_with = Vec::new();

        for requirement in self.prerequisites_of(course)? {
            match requirement {
                Requirement::Mandatory { course: required } => {
                    if !completed.contains(&required) {
                        missing.push(required);
                    }
                }
                Requirement::Corequisite { course: required } => {
                    if !completed.contains(&required) {
                        match self.policy.corequisite {
                            CorequisiteRule::Before => missing.push(required),
                            CorequisiteRule::Concurrent => take_with.push(required),
                        }
                    }
                }
                Requirement::OneOf { group, options } => {
                    let done: Vec<CourseCode> = options
                        .iter()
                        .filter(|c| completed.contains(*c))
                        .cloned()
                        .collect();
                    let satisfied = match self.policy.either_of {
                        EitherOfRule::AtLeastOne => !done.is_empty(),
                        EitherOfRule::ExactlyOne => done.len() == 1,
                    };
                    if !satisfied {
                        unsatisfied_groups.push(UnsatisfiedGroup {
                            group,
                            options,
                            completed: done,
                        });
                    }
                }
            }
        }

        Ok(Eligibility {
            course: course.clone(),
            eligible: missing.is_empty() && unsatisfied_groups.is_empty(),
            missing,
            unsatisfied_groups,
            take_with,
        })
    }

    /// Whether `course` may be taken given `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the course is unknown.
    pub fn can_take(
        &self,
        course: &CourseCode,
        completed: &BTreeSet<CourseCode>,
    ) -> Result<bool, GraphError> {
        Ok(self.eligibility(course, completed)?.eligible)
    }

    /// Courses blocked by failing `course`, and how far the delay reaches.
    ///
    /// # Errors
    ///
    /// Same as [`all_dependents_of`](Self::all_dependents_of).
    pub fn failure_impact(&self, course: &CourseCode) -> Result<FailureImpact, GraphError> {
        let blocked = self.all_dependents_of(course)?;
        let mut memo = HashMap::new();
        let depth = self.chain_depth(course, Direction::Dependents, &mut memo);
        Ok(FailureImpact {
            course: course.clone(),
            blocked: blocked.into_iter().collect(),
            delay_semesters: depth.saturating_sub(1),
        })
    }

    fn ensure_known(&self, code: &CourseCode) -> Result<(), GraphError> {
        if self.contains(code) {
            Ok(())
        } else {
            Err(GraphError::NotFound(code.clone()))
        }
    }

    fn links(&self, code: &CourseCode, direction: Direction) -> &[Link] {
        let map = match direction {
            Direction::Prerequisites => &self.requires,
            Direction::Dependents => &self.required_by,
        };
        map.get(code).map_or(&[], Vec::as_slice)
    }

    fn reachable(&self, start: &CourseCode, direction: Direction) -> BTreeSet<CourseCode> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(code) = stack.pop() {
            for link in self.links(code, direction) {
                if seen.insert(link.code.clone()) {
                    stack.push(&link.code);
                }
            }
        }
        seen
    }

    /// Fail if the subgraph reached from `start` touches a known defect.
    fn check_integrity(
        &self,
        start: &CourseCode,
        reached: &BTreeSet<CourseCode>,
    ) -> Result<(), GraphError> {
        if let Some(cycle) = self
            .cycles
            .iter()
            .find(|cycle| cycle.iter().any(|c| reached.contains(c)))
        {
            return Err(GraphError::Cycle(cycle.clone()));
        }

        let involved = |c: &CourseCode| c == start || reached.contains(c);
        if let Some(edge) = self
            .dangling
            .iter()
            .find(|e| involved(&e.course) && involved(&e.required))
        {
            let (course, missing) = if self.contains(&edge.required) {
                (edge.required.clone(), edge.course.clone())
            } else {
                (edge.course.clone(), edge.required.clone())
            };
            return Err(GraphError::DanglingReference { course, missing });
        }
        Ok(())
    }

    /// Number of courses in the deepest non-corequisite chain from `code`.
    ///
    /// Only called on subgraphs already checked for cycles.
    fn chain_depth(
        &self,
        code: &CourseCode,
        direction: Direction,
        memo: &mut HashMap<CourseCode, usize>,
    ) -> usize {
        if let Some(depth) = memo.get(code) {
            return *depth;
        }
        let depth = 1 + self
            .links(code, direction)
            .iter()
            .filter(|l| l.kind != EdgeKind::Corequisite)
            .map(|l| self.chain_depth(&l.code, direction, memo))
            .max()
            .unwrap_or(0);
        memo.insert(code.clone(), depth);
        depth
    }

    fn deepest_link(
        &self,
        code: &CourseCode,
        direction: Direction,
        memo: &mut HashMap<CourseCode, usize>,
    ) -> Option<&CourseCode> {
        let mut best: Option<(&CourseCode, usize)> = None;
        for link in self
            .links(code, direction)
            .iter()
            .filter(|l| l.kind != EdgeKind::Corequisite)
        {
            let depth = self.chain_depth(&link.code, direction, memo);
            match best {
                Some((_, deepest)) if depth <= deepest => {}
                _ => best = Some((&link.code, depth)),
            }
        }
        best.map(|(code, _)| code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    Grey,
    Black,
}

/// Single depth-first pass over the whole graph collecting back edges.
struct CycleFinder<'a> {
    requires: &'a BTreeMap<CourseCode, Vec<Link>>,
    colour: HashMap<&'a CourseCode, Colour>,
    path: Vec<&'a CourseCode>,
    found: BTreeSet<Vec<CourseCode>>,
}

impl<'a> CycleFinder<'a> {
    fn run(requires: &'a BTreeMap<CourseCode, Vec<Link>>) -> Vec<Vec<CourseCode>> {
        let mut finder = Self {
            requires,
            colour: HashMap::new(),
            path: Vec::new(),
            found: BTreeSet::new(),
        };
        for node in requires.keys() {
            if !finder.colour.contains_key(node) {
                finder.visit(node);
            }
        }
        finder.found.into_iter().collect()
    }

    fn visit(&mut self, node: &'a CourseCode) {
        self.colour.insert(node, Colour::Grey);
        self.path.push(node);

        let requires = self.requires;
        for link in requires.get(node).map_or(&[][..], Vec::as_slice) {
            match self.colour.get(&link.code).copied() {
                None => self.visit(&link.code),
                Some(Colour::Grey) => {
                    if let Some(start) = self.path.iter().position(|n| *n == &link.code) {
                        let cycle = self.path[start..].iter().map(|c| (*c).clone()).collect();
                        self.found.insert(rotate_to_smallest(cycle));
                    }
                }
                Some(Colour::Black) => {}
            }
        }

        self.path.pop();
        self.colour.insert(node, Colour::Black);
    }
}

fn rotate_to_smallest(mut cycle: Vec<CourseCode>) -> Vec<CourseCode> {
    if let Some(smallest) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        cycle.rotate_left(smallest);
    }
    cycle
}

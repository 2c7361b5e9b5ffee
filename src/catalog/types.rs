//! Catalog record types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CourseCode;

/// Where a course sits in the curriculum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseCategory {
    #[default]
    Core,
    Track,
    Elective,
}

impl CourseCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Track => "track",
            Self::Elective => "elective",
        }
    }
}

impl std::str::FromStr for CourseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(Self::Core),
            "track" => Ok(Self::Track),
            "elective" => Ok(Self::Elective),
            other => Err(format!("unknown course category '{other}'")),
        }
    }
}

/// A course offered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: CourseCode,
    pub title: String,
    pub credits: u8,
    #[serde(default)]
    pub category: CourseCategory,
    #[serde(default)]
    pub description: String,
}

/// How a prerequisite edge constrains enrollment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Must be completed before enrolling.
    #[default]
    Mandatory,
    /// Must be completed before or taken alongside, depending on policy.
    Corequisite,
    /// One member of the edge's group satisfies the requirement.
    EitherOf,
}

impl EdgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Corequisite => "corequisite",
            Self::EitherOf => "either_of",
        }
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mandatory" => Ok(Self::Mandatory),
            "corequisite" => Ok(Self::Corequisite),
            "either_of" => Ok(Self::EitherOf),
            other => Err(format!("unknown edge kind '{other}'")),
        }
    }
}

/// `course` requires `required` with the given kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub course: CourseCode,
    pub required: CourseCode,
    #[serde(default)]
    pub kind: EdgeKind,
    /// Either-of edges with the same label on the same course form one group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl PrerequisiteEdge {
    #[must_use]
    pub fn mandatory(course: CourseCode, required: CourseCode) -> Self {
        Self {
            course,
            required,
            kind: EdgeKind::Mandatory,
            group: None,
        }
    }

    #[must_use]
    pub fn corequisite(course: CourseCode, required: CourseCode) -> Self {
        Self {
            course,
            required,
            kind: EdgeKind::Corequisite,
            group: None,
        }
    }

    #[must_use]
    pub fn either_of(course: CourseCode, required: CourseCode, group: &str) -> Self {
        Self {
            course,
            required,
            kind: EdgeKind::EitherOf,
            group: Some(group.to_string()),
        }
    }
}

/// A specialization track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier such as `machine_intelligence`.
    pub id: String,
    pub name: String,
    /// Required courses, in recommended order.
    pub required: Vec<CourseCode>,
    #[serde(default)]
    pub electives: Vec<CourseCode>,
    #[serde(default)]
    pub min_electives: usize,
    /// Short names the classifier recognizes, e.g. `mi`.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// What a policy record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Major,
    Track,
    /// Change of major into the program.
    Transfer,
    /// Per-semester load guidance by year level.
    CourseLoad,
}

impl ScopeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Track => "track",
            Self::Transfer => "transfer",
            Self::CourseLoad => "course_load",
        }
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Self::Major),
            "track" => Ok(Self::Track),
            "transfer" => Ok(Self::Transfer),
            "course_load" => Ok(Self::CourseLoad),
            other => Err(format!("unknown policy scope '{other}'")),
        }
    }
}

/// A policy scope such as (transfer, `cs`) or (`course_load`, `freshman`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyScope {
    pub kind: ScopeKind,
    pub name: String,
}

impl PolicyScope {
    #[must_use]
    pub fn new(kind: ScopeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into().to_lowercase(),
        }
    }
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}

/// A single keyed requirement, e.g. `minimum_gpa = 2.75`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub scope: PolicyScope,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// All policy records for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    pub scope: PolicyScope,
    pub rules: Vec<Policy>,
}

/// Full catalog contents as produced by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub courses: Vec<Course>,
    pub edges: Vec<PrerequisiteEdge>,
    pub tracks: Vec<Track>,
    pub policies: Vec<Policy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_round_trips_through_str() {
        for kind in [EdgeKind::Mandatory, EdgeKind::Corequisite, EdgeKind::EitherOf] {
            assert_eq!(kind.as_str().parse::<EdgeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_policy_scope_lowercases_name() {
        let scope = PolicyScope::new(ScopeKind::Transfer, "CS");
        assert_eq!(scope.name, "cs");
        assert_eq!(scope.to_string(), "transfer:cs");
    }

    #[test]
    fn test_edge_deserializes_with_defaults() {
        let json = r#"{"course": "CS 25200", "required": "CS 25000"}"#;
        let edge: PrerequisiteEdge = serde_json::from_str(json).unwrap();
        assert_eq!(edge.kind, EdgeKind::Mandatory);
        assert!(edge.group.is_none());
    }
}

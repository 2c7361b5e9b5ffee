//! Entity extraction: course codes, tracks, year level and policy scope.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{CodeTable, CourseCode, PolicyScope, ScopeKind, Track};

/// Program whose major and transfer policies apply when none is named.
pub const DEFAULT_PROGRAM: &str = "cs";

static TRANSFER_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(codo|change (of )?majors?|switch(ing)? (in)?to|transfer(ring)?)\b")
        .expect("valid transfer pattern")
});

/// Student year, used to scope course-load guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearLevel {
    Freshman,
    Sophomore,
    Junior,
    Senior,
    Summer,
}

impl YearLevel {
    pub const ALL: [Self; 5] = [
        Self::Freshman,
        Self::Sophomore,
        Self::Junior,
        Self::Senior,
        Self::Summer,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Freshman => "freshman",
            Self::Sophomore => "sophomore",
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Summer => "summer",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Self::Freshman => r"(?i)\b(freshman|freshmen|first[- ]year|1st[- ]year)\b",
            Self::Sophomore => r"(?i)\b(sophomores?|second[- ]year|2nd[- ]year)\b",
            Self::Junior => r"(?i)\b(juniors?|third[- ]year|3rd[- ]year)\b",
            Self::Senior => r"(?i)\b(seniors?|fourth[- ]year|4th[- ]year|final year)\b",
            Self::Summer => r"(?i)\b(summer)\b",
        }
    }
}

impl std::str::FromStr for YearLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown year level '{s}'"))
    }
}

static YEAR_PATTERNS: LazyLock<Vec<(YearLevel, Regex)>> = LazyLock::new(|| {
    YearLevel::ALL
        .into_iter()
        .filter_map(|level| Regex::new(level.pattern()).ok().map(|re| (level, re)))
        .collect()
});

/// Entities found in a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entities {
    /// Canonical course codes, in order of mention.
    pub courses: Vec<CourseCode>,
    /// Track ids, in catalog order.
    pub tracks: Vec<String>,
    pub year: Option<YearLevel>,
    /// Set for policy and course-load questions when a scope can be inferred.
    pub scope: Option<PolicyScope>,
}

impl Entities {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.tracks.is_empty() && self.year.is_none()
    }
}

/// Boundary-aware matcher for track names and aliases.
#[derive(Debug, Clone, Default)]
pub struct TrackAliases {
    entries: Vec<(String, Regex)>,
}

impl TrackAliases {
    /// Build matchers from each track's id, display name and aliases.
    #[must_use]
    pub fn from_tracks(tracks: &[Track]) -> Self {
        let entries = tracks
            .iter()
            .filter_map(|track| {
                let mut names: Vec<String> = track.aliases.clone();
                names.push(track.name.clone());
                names.push(track.id.replace('_', " "));
                let alternatives: Vec<String> = names
                    .iter()
                    .filter(|n| !n.trim().is_empty())
                    .map(|n| regex::escape(n.trim()))
                    .collect();
                let pattern = format!(r"(?i)\b({})\b", alternatives.join("|"));
                match Regex::new(&pattern) {
                    Ok(re) => Some((track.id.clone(), re)),
                    Err(e) => {
                        tracing::warn!(track = %track.id, error = %e, "Skipping track aliases");
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    /// Track ids mentioned in `text`.
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extract codes, tracks and year level from `text`.
#[must_use]
pub fn extract(text: &str, codes: &CodeTable, tracks: &TrackAliases) -> Entities {
    Entities {
        courses: codes.find_all(text),
        tracks: tracks.find_all(text),
        year: YEAR_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(level, _)| *level),
        scope: None,
    }
}

/// The policy scope a policy question is about.
#[must_use]
pub fn policy_scope(text: &str, entities: &Entities) -> PolicyScope {
    if TRANSFER_CUE.is_match(text) {
        PolicyScope::new(ScopeKind::Transfer, DEFAULT_PROGRAM)
    } else if let [track] = entities.tracks.as_slice() {
        PolicyScope::new(ScopeKind::Track, track.as_str())
    } else {
        PolicyScope::new(ScopeKind::Major, DEFAULT_PROGRAM)
    }
}

/// The course-load scope, when a year level was mentioned.
#[must_use]
pub fn course_load_scope(entities: &Entities) -> Option<PolicyScope> {
    entities
        .year
        .map(|year| PolicyScope::new(ScopeKind::CourseLoad, year.as_str()))
}

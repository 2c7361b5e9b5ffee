//! Free-text question classification.

use std::sync::Arc;

use serde::Serialize;

use super::entities::{self, Entities, TrackAliases};
use super::{QueryKind, RuleSet};
use crate::catalog::{CodeTable, Track};

/// Confidence given to text no rule recognizes.
pub const GENERAL_CONFIDENCE: f64 = 0.2;

/// Confidence for text that only names courses ("CS 182").
pub const CODE_ONLY_CONFIDENCE: f64 = 0.8;

/// Confidence for text that only names a track.
pub const TRACK_ONLY_CONFIDENCE: f64 = 0.75;

/// A classified question. Built per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedQuery {
    pub text: String,
    /// Primary kind: the first matching rule.
    pub kind: QueryKind,
    /// Every matching kind, in rule order.
    pub matched: Vec<QueryKind>,
    pub entities: Entities,
    pub confidence: f64,
}

impl ClassifiedQuery {
    fn general(text: &str, entities: Entities) -> Self {
        Self {
            text: text.to_string(),
            kind: QueryKind::General,
            matched: vec![QueryKind::General],
            entities,
            confidence: GENERAL_CONFIDENCE,
        }
    }
}

/// Maps free text to a query kind and entities.
///
/// Holds no mutable state; one instance serves every request concurrently.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleSet,
    codes: Arc<CodeTable>,
    tracks: TrackAliases,
}

impl Classifier {
    #[must_use]
    pub fn new(rules: RuleSet, codes: Arc<CodeTable>, tracks: &[Track]) -> Self {
        Self {
            rules,
            codes,
            tracks: TrackAliases::from_tracks(tracks),
        }
    }

    /// Classifier with the built-in rule set.
    #[must_use]
    pub fn with_default_rules(codes: Arc<CodeTable>, tracks: &[Track]) -> Self {
        Self::new(RuleSet::with_default_rules(), codes, tracks)
    }

    /// The shared code table this classifier normalizes with.
    #[must_use]
    pub fn codes(&self) -> &Arc<CodeTable> {
        &self.codes
    }

    /// Classify a question. Never fails; unrecognized text is `General`.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassifiedQuery {
        let text = text.trim();
        if text.is_empty() {
            return ClassifiedQuery::general(text, Entities::default());
        }

        let mut entities = entities::extract(text, &self.codes, &self.tracks);

        let (kind, matched, confidence) =
            if let Some(rule) = self.rules.rules().iter().find(|r| r.is_overriding() && r.matches(text)) {
                (rule.kind(), vec![rule.kind()], rule.confidence())
            } else {
                let hits: Vec<_> = self
                    .rules
                    .rules()
                    .iter()
                    .filter(|r| !r.is_overriding() && r.matches(text))
                    .collect();
                match hits.first() {
                    Some(primary) => {
                        let mut matched: Vec<QueryKind> = Vec::with_capacity(hits.len());
                        for rule in &hits {
                            if !matched.contains(&rule.kind()) {
                                matched.push(rule.kind());
                            }
                        }
                        (primary.kind(), matched, primary.confidence())
                    }
                    None if !entities.courses.is_empty() => (
                        QueryKind::CourseInfo,
                        vec![QueryKind::CourseInfo],
                        CODE_ONLY_CONFIDENCE,
                    ),
                    None if !entities.tracks.is_empty() => (
                        QueryKind::TrackRequirements,
                        vec![QueryKind::TrackRequirements],
                        TRACK_ONLY_CONFIDENCE,
                    ),
                    None => return ClassifiedQuery::general(text, entities),
                }
            };

        if matched.contains(&QueryKind::Policy) {
            entities.scope = Some(entities::policy_scope(text, &entities));
        } else if matched.contains(&QueryKind::CourseLoad) {
            entities.scope = entities::course_load_scope(&entities);
        }

        tracing::debug!(
            kind = %kind,
            matched = ?matched,
            confidence,
            courses = entities.courses.len(),
            "Classified query"
        );

        ClassifiedQuery {
            text: text.to_string(),
            kind,
            matched,
            entities,
            confidence,
        }
    }
}

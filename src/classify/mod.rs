//! Query classification: ordered intent rules plus entity extraction.

mod classifier;
mod entities;
mod rules;

pub use classifier::{
    ClassifiedQuery, Classifier, CODE_ONLY_CONFIDENCE, GENERAL_CONFIDENCE, TRACK_ONLY_CONFIDENCE,
};
pub use entities::{Entities, TrackAliases, YearLevel, DEFAULT_PROGRAM};
pub use rules::{QueryKind, Rule, RuleError, RuleSet};

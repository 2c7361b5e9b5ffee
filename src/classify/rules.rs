//! Ordered intent rules.
//!
//! Every pattern is anchored on word boundaries so short cues never fire
//! inside longer words.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a question is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    CourseInfo,
    TrackRequirements,
    Policy,
    CourseLoad,
    Prerequisites,
    PrerequisiteChain,
    Eligibility,
    FailureImpact,
    CourseSequence,
    Roadmap,
    Comparison,
    Opinion,
    Career,
    General,
}

impl QueryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CourseInfo => "course_info",
            Self::TrackRequirements => "track_requirements",
            Self::Policy => "policy",
            Self::CourseLoad => "course_load",
            Self::Prerequisites => "prerequisites",
            Self::PrerequisiteChain => "prerequisite_chain",
            Self::Eligibility => "eligibility",
            Self::FailureImpact => "failure_impact",
            Self::CourseSequence => "course_sequence",
            Self::Roadmap => "roadmap",
            Self::Comparison => "comparison",
            Self::Opinion => "opinion",
            Self::Career => "career",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for rule construction.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    /// Invalid regex pattern.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Confidence must be within 0..=1, got {0}")]
    InvalidConfidence(f64),
}

/// A single classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    kind: QueryKind,
    pattern: Regex,
    confidence: f64,
    overriding: bool,
}

impl Rule {
    /// Create a new rule. Patterns are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidPattern` if the regex is invalid, or
    /// `RuleError::InvalidConfidence` if the confidence is outside `0..=1`.
    pub fn new(kind: QueryKind, pattern: &str, confidence: f64) -> Result<Self, RuleError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RuleError::InvalidConfidence(confidence));
        }
        Ok(Self {
            kind,
            pattern: Regex::new(&format!("(?i){pattern}"))?,
            confidence,
            overriding: false,
        })
    }

    /// Mark the rule as a conversational override: when it matches, it wins
    /// outright and no other kinds are recorded.
    #[must_use]
    pub fn overriding(mut self) -> Self {
        self.overriding = true;
        self
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn is_overriding(&self) -> bool {
        self.overriding
    }

    /// Get the pattern string (for debugging/display).
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Rules evaluated top to bottom.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a rule set with the built-in advising rules.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let rules = Self::default_rules()
            .into_iter()
            .filter_map(|result| match result {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to compile default classification rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Append a rule; it is evaluated after every existing rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn default_rules() -> Vec<Result<Rule, RuleError>> {
        vec![
            // Conversational cues decide the kind on their own.
            Rule::new(
                QueryKind::Opinion,
                r"\b(is it worth|worth it|do you (think|recommend)|would you recommend|your opinion|is \w+( \w+)? (hard|easy|difficult|fun|boring)|which (one|track|course) (is better|should i (pick|choose))|better (choice|option))\b",
                0.9,
            )
            .map(Rule::overriding),
            Rule::new(
                QueryKind::Comparison,
                r"\b(compare|compared|comparing|comparison|versus|vs|differences? between|how do .+ differ)\b",
                0.9,
            )
            .map(Rule::overriding),
            Rule::new(
                QueryKind::FailureImpact,
                r"\b(fail|fails|failed|failing|retake|retaking|withdraw from|drop(ped)? out of)\b",
                0.9,
            ),
            Rule::new(
                QueryKind::Eligibility,
                r"\b(can i (take|enroll in|register for)|am i (eligible|allowed|able|ready) (to take|for)|eligible (for|to take)|allowed to take|qualify for)\b",
                0.85,
            ),
            Rule::new(
                QueryKind::PrerequisiteChain,
                r"\b(prereq(uisite)?s? chain|chain of prereq(uisite)?s|longest chain|critical path|all (of )?(the )?prereq(uisite)?s|how many semesters (before|until))\b",
                0.85,
            ),
            Rule::new(
                QueryKind::Prerequisites,
                r"\b(prereqs?|prerequisites?|pre-reqs?|before taking|need(ed)? (before|to take))\b",
                0.9,
            ),
            Rule::new(
                QueryKind::CourseSequence,
                r"\b(what comes after|after (taking|finishing|completing)|next course|leads? to|unlocks?|what can i take (after|next))\b",
                0.8,
            ),
            Rule::new(
                QueryKind::Roadmap,
                r"\b(roadmap|(four|4)[- ]year plan|graduation plan|degree plan|semester plan|plan (my|out)|schedule (my|for)|graduate (early|on time)|what should i take)\b",
                0.8,
            ),
            Rule::new(
                QueryKind::TrackRequirements,
                r"\b(tracks?|concentrations?|specializations?)\b.*\b(require|requires|required|requirements?|courses|electives?|need)\b|\b(requirements?|required courses|electives)\b.*\b(tracks?|concentrations?)\b",
                0.9,
            ),
            Rule::new(
                QueryKind::Policy,
                r"\b(codo|change (of )?majors?|switch(ing)? (in)?to|transfer(ring)? (in)?to|gpa|minimum grade|good standing|graduation requirements?|dean'?s list|credits (to|needed to|required to) graduate)\b",
                0.85,
            ),
            Rule::new(
                QueryKind::CourseLoad,
                r"\b(how many (courses|classes|credits)|course ?load|credit (hours?|limit)|overload|per semester|full[- ]time|too many (courses|classes))\b",
                0.85,
            ),
            Rule::new(
                QueryKind::CourseInfo,
                r"\b(tell me about|describe|description of|info(rmation)? (on|about)|how many credits (is|does)|what does .+ cover)\b",
                0.9,
            ),
            Rule::new(
                QueryKind::Career,
                r"\b(careers?|jobs?|internships?|industry|salary|salaries|employers?|employment)\b",
                0.6,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(text: &str) -> Option<QueryKind> {
        RuleSet::with_default_rules()
            .rules()
            .iter()
            .find(|r| r.matches(text))
            .map(Rule::kind)
    }

    #[test]
    fn test_all_default_rules_compile() {
        assert_eq!(RuleSet::with_default_rules().len(), RuleSet::default_rules().len());
    }

    #[test]
    fn test_overrides_come_first() {
        let rules = RuleSet::with_default_rules();
        let overriding: Vec<bool> = rules.rules().iter().map(Rule::is_overriding).collect();
        assert!(overriding[0] && overriding[1]);
        assert!(overriding[2..].iter().all(|o| !o));
    }

    #[test]
    fn test_rule_by_rule() {
        assert_eq!(first_match("Is it worth taking CS 35400?"), Some(QueryKind::Opinion));
        assert_eq!(first_match("compare CS 37300 and CS 47100"), Some(QueryKind::Comparison));
        assert_eq!(first_match("what if I fail CS 18000"), Some(QueryKind::FailureImpact));
        assert_eq!(first_match("can I take CS 25200 now"), Some(QueryKind::Eligibility));
        assert_eq!(first_match("what is the prerequisite chain for CS 47100"), Some(QueryKind::PrerequisiteChain));
        assert_eq!(first_match("prereqs for cs 252"), Some(QueryKind::Prerequisites));
        assert_eq!(first_match("what comes after CS 18000"), Some(QueryKind::CourseSequence));
        assert_eq!(first_match("make me a graduation plan"), Some(QueryKind::Roadmap));
        assert_eq!(first_match("what courses does the SE track require"), Some(QueryKind::TrackRequirements));
        assert_eq!(first_match("what GPA do I need for CODO"), Some(QueryKind::Policy));
        assert_eq!(first_match("how many courses should a freshman take"), Some(QueryKind::CourseLoad));
        assert_eq!(first_match("tell me about CS 18000"), Some(QueryKind::CourseInfo));
        assert_eq!(first_match("what jobs can I get"), Some(QueryKind::Career));
    }

    #[test]
    fn test_word_boundaries() {
        // "fail" inside "failsafe", "gpa" inside "gpas" style tokens must not fire.
        assert_eq!(first_match("the failsafe option"), None);
        assert_eq!(first_match("prerequisiteless"), None);
        assert_eq!(first_match("trackside seating"), None);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(first_match("PREREQUISITES FOR CS 25200"), Some(QueryKind::Prerequisites));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(matches!(
            Rule::new(QueryKind::General, "(unclosed", 0.5),
            Err(RuleError::InvalidPattern(_))
        ));
        assert!(matches!(
            Rule::new(QueryKind::General, "ok", 1.5),
            Err(RuleError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn test_custom_rule_appended_last() {
        let mut rules = RuleSet::new();
        assert!(rules.is_empty());
        rules.add_rule(Rule::new(QueryKind::Career, r"\bresume\b", 0.7).unwrap());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].pattern(), r"(?i)\bresume\b");
    }
}

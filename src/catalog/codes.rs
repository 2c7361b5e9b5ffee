//! Canonical course codes and the legacy short-form table.
//!
//! Every component that turns user or ingestion text into a [`CourseCode`]
//! goes through one shared [`CodeTable`]. Legacy three-digit numbers are
//! resolved by explicit overrides first, so a code like `CS 241` lands on
//! `CS 25100` everywhere instead of a naive `CS 24100` in one place and the
//! right course in another.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Department letters followed by a 3- or 5-digit number, on word boundaries.
static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z]{2,5})[\s-]*(\d{5}|\d{3})\b").expect("valid course code pattern")
});

/// A normalized course identifier such as `CS 18000`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseCode(String);

impl CourseCode {
    /// Build a code from an already canonical department and 5-digit number.
    #[must_use]
    pub fn new(department: &str, number: u32) -> Self {
        Self(format!("{} {number:05}", department.to_ascii_uppercase()))
    }

    /// The code as `DEPT NNNNN`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The department part (`CS`).
    #[must_use]
    pub fn department(&self) -> &str {
        self.0.split(' ').next().unwrap_or_default()
    }

    /// The numeric part (`18000`).
    #[must_use]
    pub fn number(&self) -> &str {
        self.0.split(' ').nth(1).unwrap_or_default()
    }
}

impl std::str::FromStr for CourseCode {
    type Err = String;

    /// Accept only the canonical `DEPT NNNNN` form; free text goes through [`CodeTable`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dept, number) = s
            .split_once(' ')
            .ok_or_else(|| format!("'{s}' is not a canonical course code"))?;
        let dept_ok = !dept.is_empty() && dept.chars().all(|c| c.is_ascii_uppercase());
        let number_ok = number.len() == 5 && number.chars().all(|c| c.is_ascii_digit());
        if dept_ok && number_ok {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("'{s}' is not a canonical course code"))
        }
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single authoritative course-code normalization table.
#[derive(Debug, Clone)]
pub struct CodeTable {
    /// Departments recognized in free text, keyed by any accepted spelling.
    departments: HashMap<String, String>,
    /// Legacy `(DEPT, 3-digit)` forms whose canonical code is not `NNN00`.
    overrides: BTreeMap<(String, u32), CourseCode>,
}

impl CodeTable {
    /// Create an empty table that knows no departments.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            departments: HashMap::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// Register a department and any alternative spellings for it.
    pub fn add_department(&mut self, canonical: &str, aliases: &[&str]) {
        let canonical = canonical.to_ascii_uppercase();
        self.departments
            .insert(canonical.clone(), canonical.clone());
        for alias in aliases {
            self.departments
                .insert(alias.to_ascii_uppercase(), canonical.clone());
        }
    }

    /// Register an explicit legacy mapping (`CS`, 241) -> `CS 25100`.
    pub fn add_override(&mut self, department: &str, short: u32, canonical: CourseCode) {
        let department = self.department(department).unwrap_or_else(|| department.to_ascii_uppercase());
        self.overrides.insert((department, short), canonical);
    }

    /// Resolve a department spelling to its canonical form.
    #[must_use]
    pub fn department(&self, raw: &str) -> Option<String> {
        self.departments.get(&raw.to_ascii_uppercase()).cloned()
    }

    /// Canonicalize a department/number pair.
    ///
    /// Five-digit numbers pass through. Three-digit numbers consult the
    /// override table and otherwise gain two trailing zeros.
    #[must_use]
    pub fn canonicalize(&self, department: &str, number: &str) -> Option<CourseCode> {
        let department = self.department(department)?;
        let value: u32 = number.parse().ok()?;
        match number.len() {
            5 => Some(CourseCode::new(&department, value)),
            3 => Some(
                self.overrides
                    .get(&(department.clone(), value))
                    .cloned()
                    .unwrap_or_else(|| CourseCode::new(&department, value * 100)),
            ),
            _ => None,
        }
    }

    /// Parse a single code such as `cs180`, `CS 180`, `cs-18000`.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<CourseCode> {
        let caps = CODE_PATTERN.captures(text.trim())?;
        let whole = caps.get(0)?;
        if whole.as_str().len() != text.trim().len() {
            return None;
        }
        self.canonicalize(&caps[1], &caps[2])
    }

    /// Extract every recognized code mentioned in `text`, in order, without duplicates.
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<CourseCode> {
        let mut found: Vec<CourseCode> = Vec::new();
        for caps in CODE_PATTERN.captures_iter(text) {
            if let Some(code) = self.canonicalize(&caps[1], &caps[2]) {
                if !found.contains(&code) {
                    found.push(code);
                }
            }
        }
        found
    }

    /// All explicit overrides, for diagnostics and tests.
    pub fn overrides(&self) -> impl Iterator<Item = (String, &CourseCode)> {
        self.overrides
            .iter()
            .map(|((dept, short), code)| (format!("{dept} {short}"), code))
    }
}

impl Default for CodeTable {
    /// The curriculum's official legacy mappings.
    fn default() -> Self {
        let mut table = Self::empty();
        table.add_department("CS", &[]);
        table.add_department("MA", &["MATH"]);
        table.add_department("STAT", &["STATS"]);
        table.add_department("PHYS", &[]);
        table.add_department("ENGR", &[]);

        let cs = [
            (180, 18000),
            (182, 18200),
            (240, 24000),
            (241, 25100),
            (250, 25000),
            (251, 25100),
            (252, 25200),
            (307, 30700),
            (320, 35200),
        ];
        for (short, full) in cs {
            table.add_override("CS", short, CourseCode::new("CS", full));
        }
        for (short, full) in [(161, 16100), (162, 16200), (261, 26100), (265, 26500)] {
            table.add_override("MA", short, CourseCode::new("MA", full));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_digit_passes_through() {
        let table = CodeTable::default();
        assert_eq!(
            table.parse("cs 25200").unwrap().as_str(),
            "CS 25200"
        );
        assert_eq!(table.parse("CS25200").unwrap().as_str(), "CS 25200");
    }

    #[test]
    fn test_legacy_override_wins_over_zero_padding() {
        let table = CodeTable::default();
        assert_eq!(table.parse("CS 241").unwrap().as_str(), "CS 25100");
        assert_eq!(table.parse("cs320").unwrap().as_str(), "CS 35200");
    }

    #[test]
    fn test_unlisted_short_form_gets_padded() {
        let table = CodeTable::default();
        assert_eq!(table.parse("CS 381").unwrap().as_str(), "CS 38100");
    }

    #[test]
    fn test_department_alias() {
        let table = CodeTable::default();
        assert_eq!(table.parse("math 161").unwrap().as_str(), "MA 16100");
    }

    #[test]
    fn test_unknown_department_rejected() {
        let table = CodeTable::default();
        assert!(table.parse("XY 18000").is_none());
        assert!(table.parse("CS 1800").is_none());
    }

    #[test]
    fn test_find_all_dedupes_and_keeps_order() {
        let table = CodeTable::default();
        let codes = table.find_all("Can I take cs 252 after CS25000 and cs 251 and CS 25100?");
        let codes: Vec<&str> = codes.iter().map(CourseCode::as_str).collect();
        assert_eq!(codes, vec!["CS 25200", "CS 25000", "CS 25100"]);
    }

    #[test]
    fn test_find_all_requires_word_boundary() {
        let table = CodeTable::default();
        assert!(table.find_all("abc180000").is_empty());
        assert!(table.find_all("version cs1801").is_empty());
    }

    #[test]
    fn test_from_str_only_accepts_canonical_form() {
        assert_eq!("CS 18000".parse::<CourseCode>().unwrap().as_str(), "CS 18000");
        assert!("cs 18000".parse::<CourseCode>().is_err());
        assert!("CS 180".parse::<CourseCode>().is_err());
        assert!("CS18000".parse::<CourseCode>().is_err());
    }

    #[test]
    fn test_code_parts() {
        let code = CourseCode::new("cs", 18000);
        assert_eq!(code.department(), "CS");
        assert_eq!(code.number(), "18000");
        assert_eq!(code.to_string(), "CS 18000");
    }
}

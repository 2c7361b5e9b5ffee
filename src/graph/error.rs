//! Prerequisite graph error types.

use crate::catalog::CourseCode;

/// Errors from prerequisite graph queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The course is not in the catalog.
    #[error("Unknown course: {0}")]
    NotFound(CourseCode),

    /// A prerequisite cycle is reachable from the queried course.
    #[error("Prerequisite cycle: {}", format_cycle(.0))]
    Cycle(Vec<CourseCode>),

    /// An edge names a course the catalog does not contain.
    #[error("{course} references unknown course {missing}")]
    DanglingReference {
        course: CourseCode,
        missing: CourseCode,
    },

    /// The course's requirements cannot be met from the given history.
    #[error("Requirements for {0} cannot be satisfied")]
    Unsatisfiable(CourseCode),
}

impl GraphError {
    /// Whether this error is a data-integrity defect rather than a bad query.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Cycle(_) | Self::DanglingReference { .. })
    }
}

fn format_cycle(cycle: &[CourseCode]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(CourseCode::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_the_loop() {
        let err = GraphError::Cycle(vec![CourseCode::new("CS", 10000), CourseCode::new("CS", 20000)]);
        assert_eq!(
            err.to_string(),
            "Prerequisite cycle: CS 10000 -> CS 20000 -> CS 10000"
        );
    }

    #[test]
    fn test_integrity_classification() {
        let code = CourseCode::new("CS", 10000);
        assert!(GraphError::Cycle(vec![code.clone()]).is_integrity());
        assert!(GraphError::DanglingReference {
            course: code.clone(),
            missing: CourseCode::new("CS", 99900),
        }
        .is_integrity());
        assert!(!GraphError::NotFound(code.clone()).is_integrity());
        assert!(!GraphError::Unsatisfiable(code).is_integrity());
    }
}

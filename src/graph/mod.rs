//! Prerequisite graph: traversal, eligibility, integrity checks and planning.

mod error;
mod prereq;
mod roadmap;

pub use error::GraphError;
pub use prereq::{
    CorequisiteRule, EitherOfRule, Eligibility, FailureImpact, GraphPolicy, IntegrityReport,
    PrerequisiteGraph, Requirement, UnsatisfiedGroup, DEFAULT_GROUP,
};
pub use roadmap::{BlockedCourse, Roadmap, Semester};

//! Course catalog: canonical codes, record types and the knowledge stores.

mod codes;
mod seed;
mod sqlite;
mod store;
mod types;

pub use codes::{CodeTable, CourseCode};
pub use seed::sample_catalog;
pub use sqlite::{default_catalog_path, SqliteStore, SCHEMA};
pub use store::{KnowledgeStore, MemoryStore, StoreError};
pub use types::{
    Catalog, Course, CourseCategory, EdgeKind, Policy, PolicyScope, PolicySet, PrerequisiteEdge,
    ScopeKind, Track,
};

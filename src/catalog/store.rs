//! Knowledge store read interface and the in-memory backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{Catalog, Course, CourseCode, PolicyScope, PolicySet, Track};

/// Errors from knowledge store operations.
///
/// A missing key is never an error: lookups return `Ok(None)` for that.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached right now.
    #[error("Knowledge store unavailable: {0}")]
    Unavailable(String),

    /// Failed to open or create the database.
    #[error("Failed to open database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to execute SQL.
    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored row could not be mapped back to a record.
    #[error("Corrupt record in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// Catalog rejected before writing; the stored catalog is unchanged.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,
}

impl StoreError {
    /// Whether retrying the same read may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Query(_) | Self::TaskCancelled
        )
    }
}

/// Read access to courses, tracks and policies.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Look up a course by canonical code.
    async fn get_course(&self, code: &CourseCode) -> Result<Option<Course>, StoreError>;

    /// Look up a track by id, display name or alias (case-insensitive).
    async fn get_track(&self, name: &str) -> Result<Option<Track>, StoreError>;

    /// All policy records for a scope.
    async fn get_policy(&self, scope: &PolicyScope) -> Result<Option<PolicySet>, StoreError>;

    /// Every track in the catalog.
    async fn list_tracks(&self) -> Result<Vec<Track>, StoreError>;

    /// Full catalog contents, used to rebuild the prerequisite graph.
    async fn load_catalog(&self) -> Result<Catalog, StoreError>;
}

/// Whether `track` answers to `name`.
pub(crate) fn track_matches(track: &Track, name: &str) -> bool {
    let wanted = name.trim().to_lowercase().replace(['-', ' '], "_");
    let plain = name.trim().to_lowercase();
    track.id.to_lowercase() == wanted
        || track.name.to_lowercase() == plain
        || track.aliases.iter().any(|a| a.to_lowercase() == plain)
}

#[derive(Debug, Default)]
struct MemoryIndex {
    catalog: Catalog,
    courses: HashMap<CourseCode, Course>,
    policies: HashMap<PolicyScope, PolicySet>,
}

impl MemoryIndex {
    fn build(catalog: Catalog) -> Self {
        let courses = catalog
            .courses
            .iter()
            .map(|c| (c.code.clone(), c.clone()))
            .collect();
        let mut policies: HashMap<PolicyScope, PolicySet> = HashMap::new();
        for policy in &catalog.policies {
            policies
                .entry(policy.scope.clone())
                .or_insert_with(|| PolicySet {
                    scope: policy.scope.clone(),
                    rules: Vec::new(),
                })
                .rules
                .push(policy.clone());
        }
        Self {
            catalog,
            courses,
            policies,
        }
    }
}

/// Knowledge store held entirely in memory.
///
/// `replace` swaps the whole catalog at once; readers see either the old or
/// the new contents, never a mix.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<Arc<MemoryIndex>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            index: RwLock::new(Arc::new(MemoryIndex::build(catalog))),
        }
    }

    /// Replace the catalog wholesale.
    pub fn replace(&self, catalog: Catalog) {
        let next = Arc::new(MemoryIndex::build(catalog));
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = next;
        tracing::debug!("Memory store catalog replaced");
    }

    fn snapshot(&self) -> Arc<MemoryIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_course(&self, code: &CourseCode) -> Result<Option<Course>, StoreError> {
        Ok(self.snapshot().courses.get(code).cloned())
    }

    async fn get_track(&self, name: &str) -> Result<Option<Track>, StoreError> {
        Ok(self
            .snapshot()
            .catalog
            .tracks
            .iter()
            .find(|t| track_matches(t, name))
            .cloned())
    }

    async fn get_policy(&self, scope: &PolicyScope) -> Result<Option<PolicySet>, StoreError> {
        Ok(self.snapshot().policies.get(scope).cloned())
    }

    async fn list_tracks(&self) -> Result<Vec<Track>, StoreError> {
        Ok(self.snapshot().catalog.tracks.clone())
    }

    async fn load_catalog(&self) -> Result<Catalog, StoreError> {
        Ok(self.snapshot().catalog.clone())
    }
}

//! `SQLite`-backed knowledge store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::store::track_matches;
use super::{
    Catalog, Course, CourseCode, KnowledgeStore, Policy, PolicyScope, PolicySet,
    PrerequisiteEdge, StoreError, Track,
};

/// SQL schema for the catalog database.
pub const SCHEMA: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS courses (
    code TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    credits INTEGER NOT NULL,
    category TEXT NOT NULL DEFAULT 'core',
    description TEXT NOT NULL DEFAULT ''
);

-- Codes are not foreign keys: dangling references are an integrity finding
-- reported by the graph, not a load failure.
CREATE TABLE IF NOT EXISTS prerequisites (
    course_code TEXT NOT NULL,
    required_code TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'mandatory',
    group_label TEXT,
    UNIQUE(course_code, required_code, kind)
);

CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    min_electives INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS track_courses (
    track_id TEXT NOT NULL,
    course_code TEXT NOT NULL,
    requirement TEXT NOT NULL, -- required | elective
    position INTEGER NOT NULL,
    FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE,
    UNIQUE(track_id, course_code)
);

CREATE TABLE IF NOT EXISTS track_aliases (
    track_id TEXT NOT NULL,
    alias TEXT NOT NULL,
    FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS policies (
    scope_kind TEXT NOT NULL,
    scope_name TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    UNIQUE(scope_kind, scope_name, key)
);

CREATE INDEX IF NOT EXISTS idx_prerequisites_course ON prerequisites(course_code);
CREATE INDEX IF NOT EXISTS idx_policies_scope ON policies(scope_kind, scope_name);
";

/// Returns the default path for the catalog database.
///
/// This is `~/.local/share/course-advisor/catalog.db` on Unix systems.
#[must_use]
pub fn default_catalog_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("course-advisor")
        .join("catalog.db")
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        table,
        reason: reason.into(),
    }
}

fn parse_code(table: &'static str, raw: &str) -> Result<CourseCode, StoreError> {
    raw.parse().map_err(|e: String| corrupt(table, e))
}

fn read_course(conn: &Connection, code: &str) -> Result<Option<Course>, StoreError> {
    let row = conn
        .query_row(
            "SELECT code, title, credits, category, description FROM courses WHERE code = ?1",
            params![code],
            |row| {
                let code: String = row.get(0)?;
                let title: String = row.get(1)?;
                let credits: u8 = row.get(2)?;
                let category: String = row.get(3)?;
                let description: String = row.get(4)?;
                Ok((code, title, credits, category, description))
            },
        )
        .optional()?;

    row.map(|(code, title, credits, category, description)| {
        Ok(Course {
            code: parse_code("courses", &code)?,
            title,
            credits,
            category: category.parse().map_err(|e: String| corrupt("courses", e))?,
            description,
        })
    })
    .transpose()
}

fn read_courses(conn: &Connection) -> Result<Vec<Course>, StoreError> {
    let mut stmt = conn.prepare("SELECT code FROM courses ORDER BY code")?;
    let codes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut courses = Vec::with_capacity(codes.len());
    for code in codes {
        if let Some(course) = read_course(conn, &code)? {
            courses.push(course);
        }
    }
    Ok(courses)
}

fn read_edges(conn: &Connection) -> Result<Vec<PrerequisiteEdge>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT course_code, required_code, kind, group_label FROM prerequisites
         ORDER BY course_code, required_code",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let course: String = row.get(0)?;
            let required: String = row.get(1)?;
            let kind: String = row.get(2)?;
            let group: Option<String> = row.get(3)?;
            Ok((course, required, kind, group))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(course, required, kind, group)| {
            Ok(PrerequisiteEdge {
                course: parse_code("prerequisites", &course)?,
                required: parse_code("prerequisites", &required)?,
                kind: kind.parse().map_err(|e: String| corrupt("prerequisites", e))?,
                group,
            })
        })
        .collect()
}

fn read_tracks(conn: &Connection) -> Result<Vec<Track>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, min_electives FROM tracks ORDER BY id")?;
    let headers = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let min_electives: i64 = row.get(2)?;
            Ok((id, name, min_electives))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut courses_stmt = conn.prepare(
        "SELECT course_code, requirement FROM track_courses WHERE track_id = ?1 ORDER BY position",
    )?;
    let mut alias_stmt =
        conn.prepare("SELECT alias FROM track_aliases WHERE track_id = ?1 ORDER BY alias")?;

    let mut tracks = Vec::with_capacity(headers.len());
    for (id, name, min_electives) in headers {
        let rows = courses_stmt
            .query_map(params![id], |row| {
                let code: String = row.get(0)?;
                let requirement: String = row.get(1)?;
                Ok((code, requirement))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let aliases = alias_stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut required = Vec::new();
        let mut electives = Vec::new();
        for (code, requirement) in rows {
            let code = parse_code("track_courses", &code)?;
            match requirement.as_str() {
                "required" => required.push(code),
                "elective" => electives.push(code),
                other => {
                    return Err(corrupt(
                        "track_courses",
                        format!("unknown requirement '{other}'"),
                    ))
                }
            }
        }

        tracks.push(Track {
            id,
            name,
            required,
            electives,
            min_electives: usize::try_from(min_electives).unwrap_or(0),
            aliases,
        });
    }
    Ok(tracks)
}

fn read_policies(conn: &Connection, scope: Option<&PolicyScope>) -> Result<Vec<Policy>, StoreError> {
    let (sql, args): (&str, Vec<String>) = match scope {
        Some(scope) => (
            "SELECT scope_kind, scope_name, key, value, description FROM policies
             WHERE scope_kind = ?1 AND scope_name = ?2 ORDER BY key",
            vec![scope.kind.as_str().to_string(), scope.name.clone()],
        ),
        None => (
            "SELECT scope_kind, scope_name, key, value, description FROM policies
             ORDER BY scope_kind, scope_name, key",
            Vec::new(),
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let kind: String = row.get(0)?;
            let name: String = row.get(1)?;
            let key: String = row.get(2)?;
            let value: String = row.get(3)?;
            let description: String = row.get(4)?;
            Ok((kind, name, key, value, description))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(kind, name, key, value, description)| {
            Ok(Policy {
                scope: PolicyScope::new(
                    kind.parse().map_err(|e: String| corrupt("policies", e))?,
                    name,
                ),
                key,
                value,
                description,
            })
        })
        .collect()
}

/// Each course appears at most once per track, as required or as elective.
fn check_track_listings(catalog: &Catalog) -> Result<(), StoreError> {
    for track in &catalog.tracks {
        let mut seen = HashSet::new();
        for code in track.required.iter().chain(&track.electives) {
            if !seen.insert(code) {
                return Err(StoreError::InvalidCatalog(format!(
                    "{code} is listed more than once in track {}",
                    track.id
                )));
            }
        }
    }
    Ok(())
}

fn write_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM track_aliases; DELETE FROM track_courses; DELETE FROM tracks;
         DELETE FROM prerequisites; DELETE FROM courses; DELETE FROM policies;",
    )?;

    for course in &catalog.courses {
        tx.execute(
            "INSERT INTO courses (code, title, credits, category, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                course.code.as_str(),
                course.title,
                course.credits,
                course.category.as_str(),
                course.description
            ],
        )?;
    }
    for edge in &catalog.edges {
        tx.execute(
            "INSERT OR IGNORE INTO prerequisites (course_code, required_code, kind, group_label)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                edge.course.as_str(),
                edge.required.as_str(),
                edge.kind.as_str(),
                edge.group
            ],
        )?;
    }
    for track in &catalog.tracks {
        tx.execute(
            "INSERT INTO tracks (id, name, min_electives) VALUES (?1, ?2, ?3)",
            params![
                track.id,
                track.name,
                i64::try_from(track.min_electives).unwrap_or(i64::MAX)
            ],
        )?;
        let listed = track
            .required
            .iter()
            .map(|c| (c, "required"))
            .chain(track.electives.iter().map(|c| (c, "elective")));
        for (position, (code, requirement)) in listed.enumerate() {
            tx.execute(
                "INSERT INTO track_courses (track_id, course_code, requirement, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    track.id,
                    code.as_str(),
                    requirement,
                    i64::try_from(position).unwrap_or(i64::MAX)
                ],
            )?;
        }
        for alias in &track.aliases {
            tx.execute(
                "INSERT INTO track_aliases (track_id, alias) VALUES (?1, ?2)",
                params![track.id, alias],
            )?;
        }
    }
    for policy in &catalog.policies {
        tx.execute(
            "INSERT OR REPLACE INTO policies (scope_kind, scope_name, key, value, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                policy.scope.kind.as_str(),
                policy.scope.name,
                policy.key,
                policy.value,
                policy.description
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Knowledge store persisted in `SQLite`.
///
/// Reads run on the blocking pool; `replace_catalog` rewrites every table
/// inside one transaction so readers never see a half-written catalog.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a catalog database, creating it and its parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path_clone).map_err(|source| StoreError::DatabaseOpen {
                path: path_clone,
                source,
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        tracing::debug!(path = %path.display(), "Opened catalog database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory catalog database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StoreError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the whole catalog atomically. Used by the ingestion step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCatalog`] if a track lists a course twice,
    /// or an error if any insert fails; the previous catalog is kept.
    pub async fn replace_catalog(&self, catalog: Catalog) -> Result<(), StoreError> {
        if let Err(error) = check_track_listings(&catalog) {
            tracing::warn!(%error, "Rejected catalog replacement");
            return Err(error);
        }
        let conn = self.conn.clone();
        let courses = catalog.courses.len();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut conn = conn.blocking_lock();
            write_catalog(&mut conn, &catalog)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        tracing::info!(courses, "Catalog database replaced");
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_course(&self, code: &CourseCode) -> Result<Option<Course>, StoreError> {
        let code = code.as_str().to_string();
        self.with_conn(move |conn| read_course(conn, &code)).await
    }

    async fn get_track(&self, name: &str) -> Result<Option<Track>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            Ok(read_tracks(conn)?
                .into_iter()
                .find(|t| track_matches(t, &name)))
        })
        .await
    }

    async fn get_policy(&self, scope: &PolicyScope) -> Result<Option<PolicySet>, StoreError> {
        let scope = scope.clone();
        self.with_conn(move |conn| {
            let rules = read_policies(conn, Some(&scope))?;
            Ok((!rules.is_empty()).then_some(PolicySet { scope, rules }))
        })
        .await
    }

    async fn list_tracks(&self) -> Result<Vec<Track>, StoreError> {
        self.with_conn(read_tracks).await
    }

    async fn load_catalog(&self) -> Result<Catalog, StoreError> {
        self.with_conn(|conn| {
            Ok(Catalog {
                courses: read_courses(conn)?,
                edges: read_edges(conn)?,
                tracks: read_tracks(conn)?,
                policies: read_policies(conn, None)?,
            })
        })
        .await
    }
}

//! In-process collaborators for failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use course_advisor::ai::{AiError, TextGenerator};
use course_advisor::catalog::{
    sample_catalog, Catalog, CodeTable, Course, CourseCode, KnowledgeStore, MemoryStore,
    PolicyScope, PolicySet, StoreError, Track,
};
use course_advisor::config::AdvisorConfig;
use course_advisor::engine::AdvisorEngine;

/// Store whose point lookups fail while `failing` is set. Catalog loads
/// always succeed so engines can be opened over it.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl FlakyStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: MemoryStore::new(catalog),
            failing: AtomicBool::new(false),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get_course(&self, code: &CourseCode) -> Result<Option<Course>, StoreError> {
        self.check()?;
        self.inner.get_course(code).await
    }

    async fn get_track(&self, name: &str) -> Result<Option<Track>, StoreError> {
        self.check()?;
        self.inner.get_track(name).await
    }

    async fn get_policy(&self, scope: &PolicyScope) -> Result<Option<PolicySet>, StoreError> {
        self.check()?;
        self.inner.get_policy(scope).await
    }

    async fn list_tracks(&self) -> Result<Vec<Track>, StoreError> {
        self.check()?;
        self.inner.list_tracks().await
    }

    async fn load_catalog(&self) -> Result<Catalog, StoreError> {
        self.inner.load_catalog().await
    }
}

/// Generator that answers with a fixed text and remembers the facts it saw.
#[derive(Default)]
pub struct CannedGenerator {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl CannedGenerator {
    pub const ANSWER: &'static str = "Both tracks lead to strong careers; pick by interest.";

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str, facts: &[String]) -> Result<String, AiError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), facts.to_vec()));
        Ok(Self::ANSWER.to_string())
    }
}

/// Generator whose upstream is always down.
pub struct DownGenerator;

#[async_trait]
impl TextGenerator for DownGenerator {
    async fn generate(&self, _prompt: &str, _facts: &[String]) -> Result<String, AiError> {
        Err(AiError::RequestFailed("HTTP 503: upstream overloaded".to_string()))
    }
}

/// Config with retries off so each query records exactly one failure per tier.
pub fn no_retry_config() -> AdvisorConfig {
    let mut config = AdvisorConfig::default();
    config.router.max_retries = 0;
    config
}

pub async fn engine_over(
    store: Arc<dyn KnowledgeStore>,
    config: AdvisorConfig,
    generator: Option<Arc<dyn TextGenerator>>,
) -> AdvisorEngine {
    let engine = AdvisorEngine::open(config, Arc::new(CodeTable::default()), store)
        .await
        .expect("catalog should load");
    match generator {
        Some(generator) => engine.with_generator(generator),
        None => engine,
    }
}

pub async fn sample_engine(generator: Option<Arc<dyn TextGenerator>>) -> AdvisorEngine {
    engine_over(
        Arc::new(MemoryStore::new(sample_catalog())),
        AdvisorConfig::default(),
        generator,
    )
    .await
}

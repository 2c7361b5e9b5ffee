//! The advisor engine: classification, guarded routing and catalog reloads.

use std::sync::{Arc, PoisonError, RwLock};

use crate::ai::TextGenerator;
use crate::catalog::{
    Catalog, CodeTable, Course, CourseCode, KnowledgeStore, PrerequisiteEdge, StoreError, Track,
};
use crate::classify::{ClassifiedQuery, Classifier};
use crate::compose::{compose, AdvisorResponse};
use crate::config::AdvisorConfig;
use crate::graph::{IntegrityReport, PrerequisiteGraph};
use crate::router::{Router, RoutingDecision, StudentContext};
use crate::safety::{SafetyLayer, SafetyReport};

/// Graph, tracks and classifier published together by one reload.
#[derive(Debug)]
pub struct CatalogSnapshot {
    graph: Arc<PrerequisiteGraph>,
    classifier: Arc<Classifier>,
    tracks: Vec<Track>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn graph(&self) -> &Arc<PrerequisiteGraph> {
        &self.graph
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// Owns the shared read-mostly state and the process-wide safety layer.
///
/// Reloads swap the whole [`CatalogSnapshot`] in one write; a query holds
/// the `Arc` it started with, so its aliases and graph always agree.
pub struct AdvisorEngine {
    config: AdvisorConfig,
    codes: Arc<CodeTable>,
    store: Arc<dyn KnowledgeStore>,
    router: Router,
    safety: SafetyLayer,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl std::fmt::Debug for AdvisorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorEngine")
            .field("store", &self.store.name())
            .field("router", &self.router)
            .field("courses", &self.graph().len())
            .finish_non_exhaustive()
    }
}

impl AdvisorEngine {
    /// Engine with an empty graph. Call [`reload_from_store`](Self::reload_from_store)
    /// before answering questions, or use [`open`](Self::open).
    #[must_use]
    pub fn new(config: AdvisorConfig, codes: Arc<CodeTable>, store: Arc<dyn KnowledgeStore>) -> Self {
        let router = Router::new(config.router.clone(), Arc::clone(&store))
            .with_per_semester_cap(config.graph.per_semester_cap);
        let snapshot = CatalogSnapshot {
            graph: Arc::new(PrerequisiteGraph::build(Vec::new(), Vec::new(), config.graph.policy())),
            classifier: Arc::new(Classifier::with_default_rules(Arc::clone(&codes), &[])),
            tracks: Vec::new(),
        };
        Self {
            safety: SafetyLayer::new(config.safety.clone()),
            config,
            codes,
            store,
            router,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Engine loaded from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read from the store.
    pub async fn open(
        config: AdvisorConfig,
        codes: Arc<CodeTable>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Result<Self, StoreError> {
        let engine = Self::new(config, codes, store);
        engine.reload_from_store().await?;
        Ok(engine)
    }

    /// Attach the escalation collaborator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.router = self.router.with_generator(generator);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// The shared code table.
    #[must_use]
    pub fn codes(&self) -> &Arc<CodeTable> {
        &self.codes
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn safety(&self) -> &SafetyLayer {
        &self.safety
    }

    /// The current catalog snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The current graph.
    #[must_use]
    pub fn graph(&self) -> Arc<PrerequisiteGraph> {
        Arc::clone(&self.snapshot().graph)
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> ClassifiedQuery {
        self.snapshot().classifier.classify(text)
    }

    /// Classify and route a question, returning both for inspection.
    pub async fn decide(
        &self,
        text: &str,
        student: &StudentContext,
    ) -> (ClassifiedQuery, RoutingDecision) {
        let snapshot = self.snapshot();
        let query = snapshot.classifier.classify(text);
        let decision = self
            .safety
            .guarded_route(&self.router, &query, student, &snapshot.graph)
            .await;
        tracing::info!(
            kind = %decision.kind,
            tier = ?decision.tier,
            success = decision.success(),
            attempts = decision.attempts.len(),
            "Answered question"
        );
        (query, decision)
    }

    /// Answer a question.
    pub async fn ask(&self, text: &str, student: &StudentContext) -> AdvisorResponse {
        let (_, decision) = self.decide(text, student).await;
        compose(&decision)
    }

    /// Canonical form of `code` per the shared table; unknown spellings are kept.
    #[must_use]
    pub fn normalize_code(&self, code: &CourseCode) -> CourseCode {
        self.codes.parse(code.as_str()).unwrap_or_else(|| code.clone())
    }

    /// Rewrite every code in courses and edges to canonical form.
    #[must_use]
    pub fn normalize_codes(
        &self,
        mut courses: Vec<Course>,
        mut edges: Vec<PrerequisiteEdge>,
    ) -> (Vec<Course>, Vec<PrerequisiteEdge>) {
        for course in &mut courses {
            course.code = self.normalize_code(&course.code);
        }
        for edge in &mut edges {
            edge.course = self.normalize_code(&edge.course);
            edge.required = self.normalize_code(&edge.required);
        }
        (courses, edges)
    }

    /// Rebuild the graph from `courses` and `edges`, keeping the current
    /// tracks, and swap it in.
    pub fn reload(&self, courses: Vec<Course>, edges: Vec<PrerequisiteEdge>) -> IntegrityReport {
        let tracks = self.snapshot().tracks.clone();
        self.publish(courses, edges, tracks)
    }

    /// Rebuild graph, tracks and aliases from a full catalog and swap them in
    /// together.
    pub fn reload_catalog(&self, catalog: Catalog) -> IntegrityReport {
        let Catalog {
            courses,
            edges,
            tracks,
            ..
        } = catalog;
        self.publish(courses, edges, tracks)
    }

    /// Reload the graph and track aliases from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read from the store.
    pub async fn reload_from_store(&self) -> Result<IntegrityReport, StoreError> {
        let catalog = self.store.load_catalog().await?;
        Ok(self.reload_catalog(catalog))
    }

    fn publish(
        &self,
        courses: Vec<Course>,
        edges: Vec<PrerequisiteEdge>,
        mut tracks: Vec<Track>,
    ) -> IntegrityReport {
        let (courses, edges) = self.normalize_codes(courses, edges);
        for track in &mut tracks {
            track.required = track.required.iter().map(|c| self.normalize_code(c)).collect();
            track.electives = track.electives.iter().map(|c| self.normalize_code(c)).collect();
        }
        let graph = PrerequisiteGraph::build(courses, edges, self.config.graph.policy());
        let report = graph.integrity_report();
        let snapshot = CatalogSnapshot {
            graph: Arc::new(graph),
            classifier: Arc::new(Classifier::with_default_rules(Arc::clone(&self.codes), &tracks)),
            tracks,
        };
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        if report.is_clean() {
            tracing::info!(courses = report.courses, edges = report.edges, "Catalog reloaded");
        } else {
            tracing::warn!(
                courses = report.courses,
                edges = report.edges,
                cycles = report.cycles.len(),
                dangling = report.dangling.len(),
                "Catalog reloaded with integrity defects"
            );
        }
        report
    }

    #[must_use]
    pub fn integrity_report(&self) -> IntegrityReport {
        self.graph().integrity_report()
    }

    pub fn reset_circuit_breaker(&self) {
        self.safety.reset_circuit_breaker();
    }

    pub fn force_escalation_only(&self, enabled: bool) {
        self.safety.force_escalation_only(enabled);
    }

    #[must_use]
    pub fn safety_report(&self) -> SafetyReport {
        self.safety.report()
    }
}

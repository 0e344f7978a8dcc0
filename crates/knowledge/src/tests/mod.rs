//! End-to-end tests across the backing store, registry and orchestrator.


use crate::backing::{QaRepository, SqliteRepository};
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::orchestrator::SyncOrchestrator;
use crate::registry::IndexRegistry;
use crate::types::{IndexedDocument, RecordId};
use async_trait::async_trait;
use qabase_core::config::IndexSettings;
use qabase_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Trigram embeddings that can be switched to fail on demand.
#[derive(Debug)]
pub(crate) struct SwitchableProvider {
    inner: TrigramProvider,
    failing: AtomicBool,
}

impl SwitchableProvider {
    pub(crate) fn new() -> Self {
        Self {
            inner: TrigramProvider::new(384),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for SwitchableProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Embedding("embedding backend down".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// A knowledge base over an in-memory database and a temporary vector store.
pub(crate) struct TestKb {
    pub temp: TempDir,
    pub repo: Arc<SqliteRepository>,
    pub embedder: Arc<SwitchableProvider>,
    pub settings: IndexSettings,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl TestKb {
    pub(crate) fn new() -> Self {
        Self::with_settings(IndexSettings::default())
    }

    pub(crate) fn with_settings(settings: IndexSettings) -> Self {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
        let embedder = Arc::new(SwitchableProvider::new());
        let orchestrator = Arc::new(build_orchestrator(
            &temp.path().join("vector_store"),
            &repo,
            &embedder,
            &settings,
        ));

        Self {
            temp,
            repo,
            embedder,
            settings,
            orchestrator,
        }
    }

    pub(crate) fn vector_dir(&self) -> PathBuf {
        self.temp.path().join("vector_store")
    }

    /// A fresh orchestrator over the same database and files, with an empty registry.
    pub(crate) fn reopen(&self) -> SyncOrchestrator {
        build_orchestrator(&self.vector_dir(), &self.repo, &self.embedder, &self.settings)
    }

    /// Insert a record behind the orchestrator's back.
    pub(crate) fn insert_raw(&self, question: &str, answer: &str, index_name: &str) -> RecordId {
        self.repo.insert_record(question, answer, index_name).unwrap().id
    }
}

fn build_orchestrator(
    dir: &std::path::Path,
    repo: &Arc<SqliteRepository>,
    embedder: &Arc<SwitchableProvider>,
    settings: &IndexSettings,
) -> SyncOrchestrator {
    let embedder: Arc<dyn EmbeddingProvider> = embedder.clone();
    let registry = IndexRegistry::new(
        dir,
        embedder,
        settings.score_threshold,
        settings.max_loaded_indices,
    );
    let repo: Arc<dyn QaRepository> = repo.clone();
    SyncOrchestrator::new(repo, Arc::new(registry), settings)
}

/// Documents currently held by the named index, in entry order.
pub(crate) async fn index_documents(
    orchestrator: &SyncOrchestrator,
    name: &str,
) -> Vec<IndexedDocument> {
    let mut slot = orchestrator.registry().lock(name).await.unwrap();
    slot.store_mut().unwrap().documents().cloned().collect()
}

/// Sorted record ids of the named index's entries.
pub(crate) async fn index_record_ids(orchestrator: &SyncOrchestrator, name: &str) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = index_documents(orchestrator, name)
        .await
        .iter()
        .map(|d| d.key.record_id())
        .collect();
    ids.sort_unstable();
    ids
}

/// Sorted ids of the backing-store records belonging to `name`.
pub(crate) fn repo_record_ids(repo: &SqliteRepository, name: &str) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = repo
        .fetch_all_records()
        .unwrap()
        .into_iter()
        .filter(|r| r.index_name == name)
        .map(|r| r.id)
        .collect();
    ids.sort_unstable();
    ids
}

//! Named vector-index management for the QA knowledge base.
//!
//! Keeps one similarity index per knowledge-base name in step with the
//! question/answer records of a relational backing store, and serves top-k
//! similarity queries over them.

pub mod ann;
pub mod backing;
pub mod embeddings;
pub mod orchestrator;
pub mod outcome;
pub mod registry;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backing::{QaRepository, SqliteRepository};
pub use orchestrator::SyncOrchestrator;
pub use outcome::Outcome;
pub use registry::{IndexRegistry, IndexSlot};
pub use store::VectorIndexStore;
pub use types::{
    DocumentKey, IndexStats, IndexedDocument, QaRecord, QueryHit, RecordId, ReindexStats,
};

use embeddings::create_provider;
use qabase_core::{AppConfig, AppResult};
use std::sync::Arc;

/// Wire the backing store, embedding provider and registry from configuration.
///
/// The registry starts empty; call [`SyncOrchestrator::bootstrap`] to load
/// the indices listed in the catalog.
pub async fn open(config: &AppConfig) -> AppResult<SyncOrchestrator> {
    let database_path = config.database_path();
    let repository = SqliteRepository::open(&database_path)?;

    let embedder = create_provider(&config.embedding).await?;

    let vector_store_dir = config.vector_store_dir();
    tracing::debug!(
        "Opening knowledge base: database={:?}, vector_store={:?}",
        database_path,
        vector_store_dir
    );

    let registry = IndexRegistry::new(
        vector_store_dir,
        embedder,
        config.index.score_threshold,
        config.index.max_loaded_indices,
    );

    Ok(SyncOrchestrator::new(
        Arc::new(repository),
        Arc::new(registry),
        &config.index,
    ))
}

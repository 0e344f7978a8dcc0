//! Keeps the backing store and the vector indices in step.
//!
//! Each operation runs the backing-store step first and touches an index
//! only after that step succeeded. There is no rollback: when a later index
//! step fails the relational change stays, and a reindex repairs the index.
//!
//! Bulk reindex excludes every other operation; operations on different
//! index names otherwise run in parallel, and operations on the same name are
//! serialised by the registry's per-name slots.

use crate::backing::QaRepository;
use crate::registry::IndexRegistry;
use crate::store::{validate_index_name, VectorIndexStore};
use crate::types::{QaRecord, QueryHit, RecordId, ReindexStats};
use futures::future::try_join_all;
use qabase_core::config::IndexSettings;
use qabase_core::{AppError, AppResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Coordinates record mutations with their index projections.
pub struct SyncOrchestrator {
    repository: Arc<dyn QaRepository>,
    registry: Arc<IndexRegistry>,
    top_k: usize,
    strict_updates: bool,
    /// Held for write by bulk reindex, for read by everything else.
    reindex_gate: RwLock<()>,
}

impl SyncOrchestrator {
    pub fn new(
        repository: Arc<dyn QaRepository>,
        registry: Arc<IndexRegistry>,
        settings: &IndexSettings,
    ) -> Self {
        Self {
            repository,
            registry,
            top_k: settings.top_k,
            strict_updates: settings.strict_updates,
            reindex_gate: RwLock::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn QaRepository> {
        &self.repository
    }

    /// Load every index listed in the backing store's catalog.
    pub async fn bootstrap(&self) -> AppResult<usize> {
        let catalog = self.repository.fetch_index_catalog()?;
        debug!("Index catalog lists {} names", catalog.len());
        Ok(self.registry.bootstrap(catalog).await)
    }

    /// Rebuild every index from the backing store.
    ///
    /// All stores are built before any is installed, so an embedding failure
    /// leaves the current indices untouched. Catalog or loaded names that no
    /// longer have records are replaced by an empty index.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> AppResult<ReindexStats> {
        let _gate = self.reindex_gate.write().await;

        let records = self.repository.fetch_all_records()?;
        info!("Reindexing {} records", records.len());

        let mut groups: BTreeMap<String, Vec<QaRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.index_name.clone())
                .or_default()
                .push(record);
        }

        groups.retain(|name, records| match validate_index_name(name) {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping {} records with unusable index name: {}", records.len(), e);
                false
            }
        });

        let mut emptied: BTreeSet<String> =
            self.repository.fetch_index_catalog()?.into_iter().collect();
        emptied.extend(self.registry.loaded_names());
        emptied.retain(|name| !groups.contains_key(name) && validate_index_name(name).is_ok());

        let embedder = Arc::clone(self.registry.embedder());
        let threshold = self.registry.score_threshold();
        let mut stores = try_join_all(groups.iter().map(|(name, records)| {
            VectorIndexStore::create_from_records(name, records, embedder.as_ref(), threshold)
        }))
        .await?;

        for name in &emptied {
            info!("Clearing index '{}': no records remain", name);
            stores.push(VectorIndexStore::empty(name, embedder.as_ref(), threshold)?);
        }

        let mut stats = ReindexStats {
            indices: Vec::with_capacity(stores.len()),
            documents: 0,
        };

        for mut store in stores {
            let name = store.name().to_string();
            store
                .persist(self.registry.vector_store_dir())
                .map_err(|e| save_failed(&name, e))?;

            stats.documents += store.len();
            debug!("Rebuilt index '{}' with {} documents", name, store.len());

            self.registry.register(&name, store).await?;
            self.repository.ensure_catalog_entry(&name)?;
            stats.indices.push(name);
        }

        info!(
            "Reindexed {} indices, {} documents",
            stats.indices.len(),
            stats.documents
        );
        Ok(stats)
    }

    /// Store a new question/answer pair and index it. Returns the record id.
    #[instrument(skip(self, question, answer), fields(index = %index_name))]
    pub async fn add_qa(
        &self,
        question: &str,
        answer: &str,
        index_name: &str,
    ) -> AppResult<RecordId> {
        let (question, answer, index_name) = (question.trim(), answer.trim(), index_name.trim());
        if question.is_empty() || answer.is_empty() || index_name.is_empty() {
            return Err(AppError::Validation(
                "missing fields: question, answer and index name are required".to_string(),
            ));
        }
        validate_index_name(index_name)?;

        let _gate = self.reindex_gate.read().await;
        let mut slot = self.registry.lock(index_name).await?;

        let inserted = self
            .repository
            .insert_record(question, answer, index_name)?;
        if inserted.rows_affected == 0 {
            return Err(AppError::BackingStore(format!(
                "insert failed: no rows written for index '{}'",
                index_name
            )));
        }

        let record = QaRecord {
            id: inserted.id,
            question: question.to_string(),
            answer: answer.to_string(),
            index_name: index_name.to_string(),
        };
        let embedder = Arc::clone(self.registry.embedder());

        if slot.resolve()?.is_some() {
            slot.store_mut()?
                .add_document(&record, embedder.as_ref())
                .await?;
        } else {
            info!("Creating index '{}'", index_name);
            let store = VectorIndexStore::create_from_records(
                index_name,
                std::slice::from_ref(&record),
                embedder.as_ref(),
                self.registry.score_threshold(),
            )
            .await?;
            slot.install(store);
        }

        slot.store_mut()?
            .persist(self.registry.vector_store_dir())
            .map_err(|e| save_failed(index_name, e))?;

        if let Err(e) = self.repository.ensure_catalog_entry(index_name) {
            warn!("Index '{}' is missing from the catalog: {}", index_name, e);
        }

        info!("Added record {} to index '{}'", record.id, index_name);
        Ok(record.id)
    }

    /// Change a record's question and/or answer and re-index it.
    ///
    /// Absent or blank values keep the current text. Returns the updated record.
    #[instrument(skip(self, new_question, new_answer))]
    pub async fn update_qa(
        &self,
        id: RecordId,
        new_question: Option<&str>,
        new_answer: Option<&str>,
    ) -> AppResult<QaRecord> {
        let _gate = self.reindex_gate.read().await;

        let current = self.fetch_existing(id)?;
        let updated = QaRecord {
            question: pick(new_question, &current.question),
            answer: pick(new_answer, &current.answer),
            ..current.clone()
        };

        let mut slot = self.registry.lock(&current.index_name).await?;

        if self.strict_updates && slot.store_mut()?.count_key(current.key()) == 0 {
            return Err(AppError::NotFound(format!(
                "record {} has no entry in index '{}'",
                id, current.index_name
            )));
        }

        let rows = self
            .repository
            .update_record(id, &updated.question, &updated.answer)?;
        if rows == 0 {
            return Err(AppError::BackingStore(format!(
                "update failed: record {} was not changed",
                id
            )));
        }

        let embedder = Arc::clone(self.registry.embedder());
        let store = slot.store_mut()?;
        let removed = store
            .update_document(
                current.key(),
                &updated.question,
                &updated.answer,
                embedder.as_ref(),
            )
            .await?;
        if removed == 0 {
            warn!(
                "Record {} had no entry in index '{}'; inserted a new one",
                id, current.index_name
            );
        }

        store
            .persist(self.registry.vector_store_dir())
            .map_err(|e| save_failed(&current.index_name, e))?;

        info!("Updated record {} in index '{}'", id, current.index_name);
        Ok(updated)
    }

    /// Delete a record and its index entry. Returns the deleted record.
    #[instrument(skip(self))]
    pub async fn delete_qa(&self, id: RecordId) -> AppResult<QaRecord> {
        let _gate = self.reindex_gate.read().await;

        let record = self.fetch_existing(id)?;
        let mut slot = self.registry.lock(&record.index_name).await?;

        let rows = self.repository.delete_record(id)?;
        if rows == 0 {
            return Err(AppError::BackingStore(format!(
                "delete failed: record {} was not removed",
                id
            )));
        }

        let store = slot.store_mut()?;
        let removed = store.delete_document(record.key());
        if removed == 0 {
            warn!(
                "Record {} had no entry in index '{}'",
                id, record.index_name
            );
        }

        if store.is_dirty() {
            store
                .persist(self.registry.vector_store_dir())
                .map_err(|e| save_failed(&record.index_name, e))?;
        }

        info!("Deleted record {} from index '{}'", id, record.index_name);
        Ok(record)
    }

    /// Rank the stored questions of `index_name` against `text`.
    ///
    /// `k` defaults to the configured top-k. An unknown index is `NotFound`,
    /// never an empty result.
    #[instrument(skip(self, text), fields(index = %index_name))]
    pub async fn query(
        &self,
        text: &str,
        index_name: &str,
        k: Option<usize>,
    ) -> AppResult<Vec<QueryHit>> {
        let k = k.unwrap_or(self.top_k);
        if k == 0 {
            return Err(AppError::Validation("k must be at least 1".to_string()));
        }
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "missing fields: query text is required".to_string(),
            ));
        }

        // A name that could never be persisted cannot exist
        if validate_index_name(index_name).is_err() {
            return Err(AppError::NotFound(format!("index not found: '{}'", index_name)));
        }

        let _gate = self.reindex_gate.read().await;

        let mut slot = self
            .registry
            .resolve_or_load(index_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("index not found: '{}'", index_name)))?;

        let embedder = Arc::clone(self.registry.embedder());
        let hits = slot
            .store_mut()?
            .query(text, k, None, embedder.as_ref())
            .await?;

        debug!("Query on '{}' returned {} hits", index_name, hits.len());
        Ok(hits)
    }

    fn fetch_existing(&self, id: RecordId) -> AppResult<QaRecord> {
        self.repository
            .fetch_record_by_id(id)?
            .ok_or_else(|| AppError::NotFound(format!("record {} not found", id)))
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("registry", &self.registry)
            .field("top_k", &self.top_k)
            .field("strict_updates", &self.strict_updates)
            .finish()
    }
}

/// Blank or absent replacement text keeps the current value.
fn pick(new_value: Option<&str>, current: &str) -> String {
    new_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(current)
        .to_string()
}

fn save_failed(index_name: &str, error: AppError) -> AppError {
    match error {
        AppError::Persistence(msg) => {
            AppError::Persistence(format!("save failed for index '{}': {}", index_name, msg))
        }
        AppError::Io(e) => {
            AppError::Persistence(format!("save failed for index '{}': {}", index_name, e))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_falls_back_on_blank() {
        assert_eq!(pick(None, "old"), "old");
        assert_eq!(pick(Some("   "), "old"), "old");
        assert_eq!(pick(Some(" new "), "old"), "new");
    }

    #[test]
    fn test_save_failed_keeps_kind() {
        let err = save_failed("kb1", AppError::Persistence("disk full".to_string()));
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(err.to_string().contains("save failed for index 'kb1'"));

        let other = save_failed("kb1", AppError::Embedding("down".to_string()));
        assert!(matches!(other, AppError::Embedding(_)));
    }
}

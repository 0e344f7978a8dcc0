//! Named vector index over question/answer records.
//!
//! A [`VectorIndexStore`] pairs one [`AnnIndex`] with the documents its
//! entries stand for. Entries are located by the owning record's id, never
//! by question or answer text.
//!
//! Each store persists to two sibling files under the vector store directory:
//! - `<name>.index` - the binary nearest-neighbour index
//! - `<name>.meta.json` - documents, embedding identity and entry counter
//!
//! Both files must be present for a load to succeed.

use crate::ann::{AnnIndex, EntryId, FlatIndex};
use crate::embeddings::{EmbeddingIdentity, EmbeddingProvider};
use crate::types::{DocumentKey, IndexStats, IndexedDocument, QaRecord, QueryHit};
use chrono::{DateTime, Utc};
use qabase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Version of the metadata file layout.
const METADATA_VERSION: u32 = 1;

/// Longest accepted index name, in bytes.
pub const MAX_INDEX_NAME_LEN: usize = 128;

const INDEX_EXTENSION: &str = "index";
const METADATA_EXTENSION: &str = "meta.json";

/// Check that `name` can be used as an index name and as a file stem.
pub fn validate_index_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Validation("Index name is empty".to_string()));
    }

    if name.len() > MAX_INDEX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Index name is longer than {} bytes",
            MAX_INDEX_NAME_LEN
        )));
    }

    if name.starts_with('.') {
        return Err(AppError::Validation(format!(
            "Index name '{}' must not start with '.'",
            name
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(AppError::Validation(format!(
            "Index name '{}' contains invalid character {:?}",
            name, c
        )));
    }

    Ok(())
}

fn index_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, INDEX_EXTENSION))
}

fn metadata_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, METADATA_EXTENSION))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// One document as written to the metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    entry_id: EntryId,
    #[serde(flatten)]
    document: IndexedDocument,
}

/// Contents of `<name>.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexMetadata {
    version: u32,
    name: String,
    embedding: EmbeddingIdentity,
    next_id: EntryId,
    documents: Vec<StoredDocument>,
    saved_at: DateTime<Utc>,
}

/// One knowledge base's similarity index.
#[derive(Debug)]
pub struct VectorIndexStore {
    name: String,
    index: Box<dyn AnnIndex>,
    documents: BTreeMap<EntryId, IndexedDocument>,
    next_id: EntryId,
    identity: EmbeddingIdentity,
    score_threshold: f32,
    dirty: bool,
}

impl VectorIndexStore {
    /// An index with no documents.
    pub fn empty(
        name: &str,
        embedder: &dyn EmbeddingProvider,
        score_threshold: f32,
    ) -> AppResult<Self> {
        validate_index_name(name)?;

        Ok(Self {
            name: name.to_string(),
            index: Box::new(FlatIndex::new(embedder.dimensions())),
            documents: BTreeMap::new(),
            next_id: 0,
            identity: embedder.identity(),
            score_threshold,
            dirty: true,
        })
    }

    /// Build a fresh index holding one entry per record.
    ///
    /// Every question is embedded before anything is built, so an embedding
    /// failure leaves no partial index behind.
    #[instrument(skip(records, embedder), fields(index = %name, count = records.len()))]
    pub async fn create_from_records(
        name: &str,
        records: &[QaRecord],
        embedder: &dyn EmbeddingProvider,
        score_threshold: f32,
    ) -> AppResult<Self> {
        validate_index_name(name)?;

        let questions: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
        let vectors = embedder.embed_batch(&questions).await?;
        if vectors.len() != records.len() {
            return Err(AppError::Embedding(format!(
                "Embedding provider returned {} vectors for {} questions",
                vectors.len(),
                records.len()
            )));
        }

        let mut store = Self::empty(name, embedder, score_threshold)?;
        for (record, vector) in records.iter().zip(vectors) {
            store.insert_entry(record.key(), &record.question, &record.answer, vector)?;
        }

        debug!("Built index '{}' with {} documents", name, store.len());
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// True when the in-memory state has changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn identity(&self) -> &EmbeddingIdentity {
        &self.identity
    }

    /// Documents in entry order.
    pub fn documents(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.documents.values()
    }

    /// Number of entries owned by `key`.
    pub fn count_key(&self, key: DocumentKey) -> usize {
        self.documents.values().filter(|d| d.key == key).count()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.name.clone(),
            documents: self.len(),
            dimension: self.index.dimension(),
            dirty: self.dirty,
        }
    }

    /// Add the record's entry, replacing any entry already stored for its id.
    #[instrument(skip(self, record, embedder), fields(index = %self.name, key = %record.key()))]
    pub async fn add_document(
        &mut self,
        record: &QaRecord,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<()> {
        let vector = self.embed(&record.question, embedder).await?;
        self.check_dimension(&vector)?;

        let replaced = self.remove_key(record.key());
        if replaced > 0 {
            debug!("Replaced {} existing entries", replaced);
        }

        self.insert_entry(record.key(), &record.question, &record.answer, vector)
    }

    /// Replace the entries for `key` with one built from the new text.
    ///
    /// Missing entries are not an error; the new entry is inserted either
    /// way. Returns how many entries were removed.
    #[instrument(skip(self, new_question, new_answer, embedder), fields(index = %self.name, key = %key))]
    pub async fn update_document(
        &mut self,
        key: DocumentKey,
        new_question: &str,
        new_answer: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<usize> {
        let vector = self.embed(new_question, embedder).await?;
        self.check_dimension(&vector)?;

        let removed = self.remove_key(key);
        self.insert_entry(key, new_question, new_answer, vector)?;

        debug!("Updated document, {} previous entries removed", removed);
        Ok(removed)
    }

    /// Remove every entry for `key`. Returns how many were removed.
    pub fn delete_document(&mut self, key: DocumentKey) -> usize {
        let removed = self.remove_key(key);
        debug!(
            "Deleted {} entries for {} from index '{}'",
            removed, key, self.name
        );
        removed
    }

    /// The `k` entries closest to `text`, best first.
    ///
    /// Entries farther than the threshold are dropped; `None` uses the
    /// store's own threshold and a threshold of zero or less keeps everything.
    #[instrument(skip(self, text, embedder), fields(index = %self.name))]
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        threshold: Option<f32>,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<Vec<QueryHit>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = threshold.unwrap_or(self.score_threshold);
        let vector = self.embed(text, embedder).await?;

        let hits: Vec<QueryHit> = self
            .index
            .search(&vector, k)?
            .into_iter()
            .filter(|(_, distance)| threshold <= 0.0 || *distance <= threshold)
            .filter_map(|(id, distance)| {
                self.documents.get(&id).map(|doc| QueryHit {
                    question: doc.question.clone(),
                    answer: doc.answer.clone(),
                    score: distance,
                    source: doc.legacy_source(),
                    record_id: doc.key.record_id(),
                })
            })
            .collect();

        debug!("Query returned {} hits", hits.len());
        Ok(hits)
    }

    /// True when both persisted files for `name` exist under `dir`.
    pub fn exists(dir: &Path, name: &str) -> bool {
        index_path(dir, name).is_file() && metadata_path(dir, name).is_file()
    }

    /// Write both files for this index under `dir`.
    ///
    /// Each file is written next to its target and renamed into place.
    #[instrument(skip(self, dir), fields(index = %self.name, documents = self.len()))]
    pub fn persist(&mut self, dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to create vector store directory {:?}: {}",
                dir, e
            ))
        })?;

        let metadata = IndexMetadata {
            version: METADATA_VERSION,
            name: self.name.clone(),
            embedding: self.identity.clone(),
            next_id: self.next_id,
            documents: self
                .documents
                .iter()
                .map(|(entry_id, document)| StoredDocument {
                    entry_id: *entry_id,
                    document: document.clone(),
                })
                .collect(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&metadata)?;

        let index_file = index_path(dir, &self.name);
        let index_tmp = tmp_path(&index_file);
        self.index.save(&index_tmp)?;

        let metadata_file = metadata_path(dir, &self.name);
        let metadata_tmp = tmp_path(&metadata_file);
        std::fs::write(&metadata_tmp, json).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to write metadata file {:?}: {}",
                metadata_tmp, e
            ))
        })?;

        // Metadata first: a pair left half-renamed fails the entry check on
        // load and reads as absent
        for (tmp, target) in [(&metadata_tmp, &metadata_file), (&index_tmp, &index_file)] {
            std::fs::rename(tmp, target).map_err(|e| {
                AppError::Persistence(format!("Failed to move {:?} into place: {}", target, e))
            })?;
        }

        self.dirty = false;
        debug!("Persisted index '{}' to {:?}", self.name, dir);
        Ok(())
    }

    /// Load the index `name` persisted under `dir`.
    ///
    /// # Errors
    /// * `AppError::NotFound` - If either file is missing, or the two files hold different entries
    /// * `AppError::Embedding` - If the index was built with a different embedding identity
    /// * `AppError::Persistence` - If a file is unreadable or malformed
    #[instrument(skip(dir, embedder), fields(index = %name))]
    pub fn load(
        dir: &Path,
        name: &str,
        embedder: &dyn EmbeddingProvider,
        score_threshold: f32,
    ) -> AppResult<Self> {
        validate_index_name(name)?;

        if !Self::exists(dir, name) {
            return Err(AppError::NotFound(format!(
                "No persisted index '{}' in {:?}",
                name, dir
            )));
        }

        let metadata_file = metadata_path(dir, name);
        let raw = std::fs::read_to_string(&metadata_file).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to read metadata file {:?}: {}",
                metadata_file, e
            ))
        })?;
        let metadata: IndexMetadata = serde_json::from_str(&raw).map_err(|e| {
            AppError::Persistence(format!(
                "Failed to parse metadata file {:?}: {}",
                metadata_file, e
            ))
        })?;

        if metadata.version != METADATA_VERSION {
            return Err(AppError::Persistence(format!(
                "Unsupported metadata version {} for index '{}'",
                metadata.version, name
            )));
        }

        if metadata.name != name {
            return Err(AppError::Persistence(format!(
                "Metadata file {:?} belongs to index '{}'",
                metadata_file, metadata.name
            )));
        }

        metadata.embedding.validate_consistency(&embedder.identity())?;

        let index = FlatIndex::load(&index_path(dir, name))?;
        if index.dimension() != metadata.embedding.dimensions {
            return Err(AppError::Persistence(format!(
                "Index '{}' has dimension {}, metadata says {}",
                name,
                index.dimension(),
                metadata.embedding.dimensions
            )));
        }

        let documents: BTreeMap<EntryId, IndexedDocument> = metadata
            .documents
            .into_iter()
            .map(|stored| (stored.entry_id, stored.document))
            .collect();

        if !index.ids().into_iter().eq(documents.keys().copied()) {
            warn!("Index '{}' files were not written together", name);
            return Err(AppError::NotFound(format!(
                "Index '{}' is half written: entries do not match its metadata",
                name
            )));
        }

        let next_id = documents
            .keys()
            .next_back()
            .map_or(metadata.next_id, |last| metadata.next_id.max(last + 1));

        debug!(
            "Loaded index '{}' ({} documents, saved {})",
            name,
            documents.len(),
            metadata.saved_at
        );

        Ok(Self {
            name: name.to_string(),
            index: Box::new(index),
            documents,
            next_id,
            identity: metadata.embedding,
            score_threshold,
            dirty: false,
        })
    }

    async fn embed(&self, text: &str, embedder: &dyn EmbeddingProvider) -> AppResult<Vec<f32>> {
        self.identity.validate_consistency(&embedder.identity())?;
        embedder.embed(text).await
    }

    fn check_dimension(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.index.dimension() {
            return Err(AppError::Embedding(format!(
                "Vector has {} dimensions, index '{}' expects {}",
                vector.len(),
                self.name,
                self.index.dimension()
            )));
        }
        Ok(())
    }

    fn insert_entry(
        &mut self,
        key: DocumentKey,
        question: &str,
        answer: &str,
        vector: Vec<f32>,
    ) -> AppResult<()> {
        let entry_id = self.next_id;
        self.index.insert(entry_id, vector)?;
        self.documents
            .insert(entry_id, IndexedDocument::new(key, question, answer));
        self.next_id += 1;
        self.dirty = true;
        Ok(())
    }

    fn remove_key(&mut self, key: DocumentKey) -> usize {
        let entry_ids: Vec<EntryId> = self
            .documents
            .iter()
            .filter(|(_, doc)| doc.key == key)
            .map(|(id, _)| *id)
            .collect();

        for id in &entry_ids {
            self.index.remove(*id);
            self.documents.remove(id);
        }

        if !entry_ids.is_empty() {
            self.dirty = true;
        }
        entry_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use tempfile::TempDir;

    fn record(id: i64, question: &str, answer: &str) -> QaRecord {
        QaRecord {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            index_name: "kb1".to_string(),
        }
    }

    fn sample_records() -> Vec<QaRecord> {
        vec![
            record(1, "How do I reset my password?", "Use the login page."),
            record(2, "Where is the billing dashboard?", "Under account settings."),
            record(3, "Which ports does the server listen on?", "8080 and 8443."),
        ]
    }

    #[derive(Debug)]
    struct FailingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn provider_name(&self) -> &str {
            "trigram"
        }

        fn model_name(&self) -> &str {
            "trigram-v1"
        }

        fn dimensions(&self) -> usize {
            384
        }

        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Err(AppError::Embedding("embedding backend down".to_string()))
        }
    }

    /// Claims the trigram identity but returns vectors of the wrong length.
    #[derive(Debug)]
    struct ShortVectorProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for ShortVectorProvider {
        fn provider_name(&self) -> &str {
            "trigram"
        }

        fn model_name(&self) -> &str {
            "trigram-v1"
        }

        fn dimensions(&self) -> usize {
            384
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; 3]).collect())
        }
    }

    #[test]
    fn test_validate_index_name() {
        assert!(validate_index_name("kb1").is_ok());
        assert!(validate_index_name("team-a_v2.prod").is_ok());

        assert!(validate_index_name("").is_err());
        assert!(validate_index_name(".hidden").is_err());
        assert!(validate_index_name("../escape").is_err());
        assert!(validate_index_name("with space").is_err());
        assert!(validate_index_name(&"x".repeat(MAX_INDEX_NAME_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_create_and_query_self_match() {
        let embedder = TrigramProvider::new(384);
        let store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();

        assert_eq!(store.len(), 3);

        let hits = store
            .query("How do I reset my password?", 1, None, &embedder)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].question, "How do I reset my password?");
        assert_eq!(hits[0].answer, "Use the login page.");
        assert_eq!(hits[0].record_id, 1);
        assert!(hits[0].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_create_fails_atomically() {
        let result =
            VectorIndexStore::create_from_records("kb1", &sample_records(), &FailingProvider, 1.0)
                .await;

        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_add_document_upserts_by_record_id() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::empty("kb1", &embedder, 1.0).unwrap();

        let rec = record(5, "Where is the billing dashboard?", "Under settings.");
        store.add_document(&rec, &embedder).await.unwrap();
        store.add_document(&rec, &embedder).await.unwrap();
        assert_eq!(store.len(), 1);

        // Same text under another id is a distinct entry
        store
            .add_document(&record(6, &rec.question, &rec.answer), &embedder)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_update_document_replaces_entry() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 0.0)
            .await
            .unwrap();

        let removed = store
            .update_document(
                DocumentKey::new(2),
                "Where is the billing dashboard?",
                "Top menu, then Billing.",
                &embedder,
            )
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 3);
        assert_eq!(store.count_key(DocumentKey::new(2)), 1);

        let hits = store
            .query("Where is the billing dashboard?", 1, None, &embedder)
            .await
            .unwrap();
        assert_eq!(hits[0].answer, "Top menu, then Billing.");
    }

    #[tokio::test]
    async fn test_update_missing_key_still_inserts() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::empty("kb1", &embedder, 1.0).unwrap();

        let removed = store
            .update_document(DocumentKey::new(99), "Question?", "Answer.", &embedder)
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_embedding_keeps_old_entry() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();

        let result = store
            .update_document(DocumentKey::new(1), "New?", "New.", &FailingProvider)
            .await;
        assert!(result.is_err());
        assert_eq!(store.count_key(DocumentKey::new(1)), 1);
    }

    #[tokio::test]
    async fn test_wrong_length_vector_keeps_old_entry() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.persist(TempDir::new().unwrap().path()).unwrap();

        let err = store
            .update_document(DocumentKey::new(1), "New?", "New.", &ShortVectorProvider)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));

        let err = store
            .add_document(&record(2, "Billing?", "Elsewhere."), &ShortVectorProvider)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));

        assert_eq!(store.len(), 3);
        assert_eq!(store.count_key(DocumentKey::new(1)), 1);
        assert_eq!(store.count_key(DocumentKey::new(2)), 1);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_delete_document() {
        let embedder = TrigramProvider::new(384);
        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 0.0)
            .await
            .unwrap();

        assert_eq!(store.delete_document(DocumentKey::new(3)), 1);
        assert_eq!(store.delete_document(DocumentKey::new(3)), 0);

        let hits = store
            .query("Which ports does the server listen on?", 10, None, &embedder)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.record_id != 3));
    }

    #[tokio::test]
    async fn test_query_threshold_filters_far_hits() {
        let embedder = TrigramProvider::new(384);
        let store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 0.0)
            .await
            .unwrap();

        let all = store
            .query("How do I reset my password?", 10, None, &embedder)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].score <= w[1].score));

        let close = store
            .query("How do I reset my password?", 10, Some(0.01), &embedder)
            .await
            .unwrap();
        assert_eq!(close.len(), 1);
        assert_eq!(close[0].record_id, 1);
    }

    #[tokio::test]
    async fn test_answer_with_colons_round_trips() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);
        let records = vec![record(1, "What ratio: water to rice?", "It is 2:1, then 1:1.")];

        let mut store = VectorIndexStore::create_from_records("kb1", &records, &embedder, 1.0)
            .await
            .unwrap();
        store.persist(temp.path()).unwrap();

        let loaded = VectorIndexStore::load(temp.path(), "kb1", &embedder, 1.0).unwrap();
        let hits = loaded
            .query("What ratio: water to rice?", 1, None, &embedder)
            .await
            .unwrap();
        assert_eq!(hits[0].answer, "It is 2:1, then 1:1.");
        assert_eq!(hits[0].source, "What ratio: water to rice?:It is 2:1, then 1:1.");
    }

    #[tokio::test]
    async fn test_persist_and_load_same_results() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 0.0)
            .await
            .unwrap();
        assert!(store.is_dirty());
        store.persist(temp.path()).unwrap();
        assert!(!store.is_dirty());
        assert!(VectorIndexStore::exists(temp.path(), "kb1"));

        let loaded = VectorIndexStore::load(temp.path(), "kb1", &embedder, 0.0).unwrap();
        assert!(!loaded.is_dirty());

        let before = store
            .query("billing password ports", 3, None, &embedder)
            .await
            .unwrap();
        let after = loaded
            .query("billing password ports", 3, None, &embedder)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_loaded_store_keeps_entry_ids_unique() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.delete_document(DocumentKey::new(3));
        store.persist(temp.path()).unwrap();

        let mut loaded = VectorIndexStore::load(temp.path(), "kb1", &embedder, 1.0).unwrap();
        loaded
            .add_document(&record(4, "Who approves refunds?", "Finance."), &embedder)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.count_key(DocumentKey::new(1)), 1);
    }

    #[tokio::test]
    async fn test_load_with_single_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.persist(temp.path()).unwrap();
        std::fs::remove_file(temp.path().join("kb1.meta.json")).unwrap();

        assert!(!VectorIndexStore::exists(temp.path(), "kb1"));
        let err = VectorIndexStore::load(temp.path(), "kb1", &embedder, 1.0).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_with_other_identity_fails() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.persist(temp.path()).unwrap();

        let other = TrigramProvider::new(128);
        let err = VectorIndexStore::load(temp.path(), "kb1", &other, 1.0).unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_load_with_half_renamed_pair_is_not_found() {
        let temp = TempDir::new().unwrap();
        let newer = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.persist(temp.path()).unwrap();

        // The next save got as far as moving its metadata into place
        store.delete_document(DocumentKey::new(3));
        store.persist(newer.path()).unwrap();
        std::fs::copy(
            newer.path().join("kb1.meta.json"),
            temp.path().join("kb1.meta.json"),
        )
        .unwrap();

        assert!(VectorIndexStore::exists(temp.path(), "kb1"));
        let err = VectorIndexStore::load(temp.path(), "kb1", &embedder, 1.0).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_rejects_garbled_metadata() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(384);

        let mut store = VectorIndexStore::create_from_records("kb1", &sample_records(), &embedder, 1.0)
            .await
            .unwrap();
        store.persist(temp.path()).unwrap();
        std::fs::write(temp.path().join("kb1.meta.json"), "{ not json").unwrap();

        let err = VectorIndexStore::load(temp.path(), "kb1", &embedder, 1.0).unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[test]
    fn test_persist_leaves_no_tmp_files() {
        let temp = TempDir::new().unwrap();
        let embedder = TrigramProvider::new(8);
        let mut store = VectorIndexStore::empty("kb1", &embedder, 1.0).unwrap();
        store.persist(temp.path()).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["kb1.index", "kb1.meta.json"]);
    }
}

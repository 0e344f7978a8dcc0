//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// Identifier assigned to a record by the backing store.
pub type RecordId = i64;

/// One question/answer pair as stored in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaRecord {
    /// Unique record identifier
    pub id: RecordId,

    /// Question text (the embedded field)
    pub question: String,

    /// Answer text
    pub answer: String,

    /// Knowledge base the record belongs to
    pub index_name: String,
}

impl QaRecord {
    /// Handle used to locate this record's entry inside its index.
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.id)
    }
}

/// Stable handle of an index entry.
///
/// Entries are located by the owning record's id, so question or answer
/// text containing any delimiter cannot make two keys collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(RecordId);

impl DocumentKey {
    pub fn new(record_id: RecordId) -> Self {
        DocumentKey(record_id)
    }

    pub fn record_id(&self) -> RecordId {
        self.0
    }
}

impl From<RecordId> for DocumentKey {
    fn from(id: RecordId) -> Self {
        DocumentKey(id)
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "qa#{}", self.0)
    }
}

/// One entry inside a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDocument {
    /// Owning record
    pub key: DocumentKey,

    /// Embedded content (the question)
    pub question: String,

    /// Answer returned alongside the question
    pub answer: String,
}

impl IndexedDocument {
    pub fn new(key: DocumentKey, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            key,
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// `question:answer`, the display form older clients expect.
    ///
    /// Informational only; it is never parsed back.
    pub fn legacy_source(&self) -> String {
        format!("{}:{}", self.question, self.answer)
    }
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    /// Matched question
    pub question: String,

    /// Answer stored with the question
    pub answer: String,

    /// Distance to the query (lower is more similar)
    pub score: f32,

    /// `question:answer` display string
    pub source: String,

    /// Backing store id of the matched record
    pub record_id: RecordId,
}

/// Result of inserting a record into the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Rows written by the insert
    pub rows_affected: usize,

    /// Id assigned to the new record
    pub id: RecordId,
}

/// Statistics from a bulk reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexStats {
    /// Index names rebuilt, in rebuild order
    pub indices: Vec<String>,

    /// Total documents written across all indices
    pub documents: usize,
}

/// Statistics for one loaded index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Index name
    pub name: String,

    /// Number of entries
    pub documents: usize,

    /// Vector dimension
    pub dimension: usize,

    /// Whether in-memory changes have not been persisted yet
    pub dirty: bool,
}

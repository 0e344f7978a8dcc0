//! Nearest-neighbour index abstraction.
//!
//! An [`AnnIndex`] only knows entry ids and vectors; what an entry means is
//! tracked by the owning [`VectorIndexStore`](crate::store::VectorIndexStore).

mod flat;

pub use flat::FlatIndex;

use qabase_core::AppResult;
use std::path::Path;

/// Handle of one vector inside an index.
pub type EntryId = u64;

/// Trait for similarity index backends.
///
/// Implementations must support:
/// - Inserting and removing vectors by entry id
/// - Searching for the k nearest vectors
/// - Writing themselves to a single file
pub trait AnnIndex: Send + Sync + std::fmt::Debug {
    /// Vector dimension accepted by this index.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a vector, replacing any vector already stored under `id`.
    fn insert(&mut self, id: EntryId, vector: Vec<f32>) -> AppResult<()>;

    /// Remove the vector stored under `id`. Returns whether one existed.
    fn remove(&mut self, id: EntryId) -> bool;

    /// The `k` nearest entries to `query`.
    ///
    /// Returns `(id, distance)` pairs ordered by ascending distance; equal
    /// distances are ordered by id.
    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(EntryId, f32)>>;

    /// Ids of every stored vector, ascending.
    fn ids(&self) -> Vec<EntryId>;

    /// Write the index to `path`.
    fn save(&self, path: &Path) -> AppResult<()>;
}

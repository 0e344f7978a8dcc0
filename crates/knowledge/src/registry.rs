//! Process-wide cache of loaded vector index stores.
//!
//! Every index name maps to one slot holding at most one
//! [`VectorIndexStore`]. Callers work on a store only while holding its slot
//! through an [`IndexSlot`], which serialises everything done to that name.
//! The cache is bounded: idle, persisted slots are evicted least recently
//! used first.

use crate::embeddings::EmbeddingProvider;
use crate::store::{validate_index_name, VectorIndexStore};
use crate::types::IndexStats;
use lru::LruCache;
use qabase_core::{AppError, AppResult};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

type Slot = Arc<AsyncMutex<Option<VectorIndexStore>>>;

/// Exclusive access to one index name.
///
/// Holding an `IndexSlot` is the per-name critical section: no other caller
/// can resolve, create, mutate or evict the same name until it is dropped.
pub struct IndexSlot {
    name: String,
    guard: OwnedMutexGuard<Option<VectorIndexStore>>,
    vector_store_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    score_threshold: f32,
}

impl IndexSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when a store is held in memory for this name.
    pub fn is_loaded(&self) -> bool {
        self.guard.is_some()
    }

    /// The in-memory store, loading it from disk when only the files exist.
    ///
    /// Returns `None` when the index exists neither in memory nor on disk, or
    /// when its files on disk are only half written.
    pub fn resolve(&mut self) -> AppResult<Option<&mut VectorIndexStore>> {
        if self.guard.is_none() && VectorIndexStore::exists(&self.vector_store_dir, &self.name) {
            let store = match VectorIndexStore::load(
                &self.vector_store_dir,
                &self.name,
                self.embedder.as_ref(),
                self.score_threshold,
            ) {
                Ok(store) => store,
                Err(e) if e.is_not_found() => {
                    debug!("Treating index '{}' as absent: {}", self.name, e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            info!(
                "Loaded index '{}' from disk ({} documents)",
                self.name,
                store.len()
            );
            *self.guard = Some(store);
        }

        let slot: &mut Option<VectorIndexStore> = &mut self.guard;
        Ok(slot.as_mut())
    }

    /// Like [`resolve`](Self::resolve), but a missing index is `NotFound`.
    pub fn store_mut(&mut self) -> AppResult<&mut VectorIndexStore> {
        let name = self.name.clone();
        self.resolve()?
            .ok_or_else(|| AppError::NotFound(format!("index not found: '{}'", name)))
    }

    /// Install `store` for this name, replacing any store already held.
    pub fn install(&mut self, store: VectorIndexStore) -> &mut VectorIndexStore {
        if self.guard.is_some() {
            debug!("Replacing in-memory index '{}'", self.name);
        }
        self.guard.insert(store)
    }
}

impl std::fmt::Debug for IndexSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSlot")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Read-through cache from index name to [`VectorIndexStore`].
///
/// Resolution order is memory, then the persisted files under the vector
/// store directory, then "not found".
pub struct IndexRegistry {
    vector_store_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    score_threshold: f32,
    capacity: NonZeroUsize,
    slots: Mutex<LruCache<String, Slot>>,
}

impl IndexRegistry {
    /// Create an empty registry.
    ///
    /// `capacity` bounds how many idle indices stay in memory; zero is
    /// treated as one.
    pub fn new(
        vector_store_dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        score_threshold: f32,
        capacity: usize,
    ) -> Self {
        Self {
            vector_store_dir: vector_store_dir.into(),
            embedder,
            score_threshold,
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            // Bounded by hand so busy or dirty slots are never dropped
            slots: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn vector_store_dir(&self) -> &Path {
        &self.vector_store_dir
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of names currently cached.
    pub fn len(&self) -> usize {
        self.slots().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enter the critical section for `name`, waiting for any current holder.
    pub async fn lock(&self, name: &str) -> AppResult<IndexSlot> {
        validate_index_name(name)?;

        let slot = self.slot(name)?;
        let guard = slot.lock_owned().await;

        Ok(IndexSlot {
            name: name.to_string(),
            guard,
            vector_store_dir: self.vector_store_dir.clone(),
            embedder: Arc::clone(&self.embedder),
            score_threshold: self.score_threshold,
        })
    }

    /// Lock `name` and resolve it from memory or disk.
    ///
    /// Returns `None` if the index does not exist; the caller decides whether
    /// that is an error or means "create".
    pub async fn resolve_or_load(&self, name: &str) -> AppResult<Option<IndexSlot>> {
        let mut slot = self.lock(name).await?;

        if slot.resolve()?.is_some() {
            return Ok(Some(slot));
        }

        drop(slot);
        self.release_empty(name)?;
        Ok(None)
    }

    /// Install or replace the in-memory store for `name`.
    pub async fn register(&self, name: &str, store: VectorIndexStore) -> AppResult<()> {
        let mut slot = self.lock(name).await?;
        slot.install(store);
        debug!("Registered index '{}'", name);
        Ok(())
    }

    /// Load every catalog name that has persisted files.
    ///
    /// Names without files, or whose files cannot be loaded, are skipped and
    /// left for a reindex to repair. Returns how many were loaded.
    pub async fn bootstrap<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;

        for name in names {
            let name = name.as_ref();
            match self.resolve_or_load(name).await {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => warn!("Skipping catalog index '{}': no persisted files", name),
                Err(e) => warn!("Skipping catalog index '{}': {}", name, e),
            }
        }

        info!("Bootstrapped {} indices from catalog", loaded);
        loaded
    }

    /// Names with a store in memory or currently in use, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let Ok(slots) = self.slots() else {
            return Vec::new();
        };

        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.try_lock().map_or(true, |guard| guard.is_some()))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Statistics for every idle loaded index, sorted by name.
    ///
    /// Indices held by another caller are left out.
    pub fn stats(&self) -> Vec<IndexStats> {
        let Ok(slots) = self.slots() else {
            return Vec::new();
        };

        let mut stats: Vec<IndexStats> = slots
            .iter()
            .filter_map(|(_, slot)| {
                slot.try_lock()
                    .ok()
                    .and_then(|guard| guard.as_ref().map(VectorIndexStore::stats))
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    fn slots(&self) -> AppResult<MutexGuard<'_, LruCache<String, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| AppError::Other("Index registry lock poisoned".to_string()))
    }

    /// The slot for `name`, created on first use.
    ///
    /// Lookup and creation happen under one lock, so every caller gets the
    /// same slot for a name.
    fn slot(&self, name: &str) -> AppResult<Slot> {
        let mut slots = self.slots()?;

        let slot = match slots.get(name) {
            Some(slot) => Arc::clone(slot),
            None => {
                let slot: Slot = Arc::new(AsyncMutex::new(None));
                slots.put(name.to_string(), Arc::clone(&slot));
                slot
            }
        };

        evict_idle(&mut slots, self.capacity.get());
        Ok(slot)
    }

    /// Drop the slot for `name` if nobody uses it and it holds no store.
    fn release_empty(&self, name: &str) -> AppResult<()> {
        let mut slots = self.slots()?;

        let empty = slots.peek(name).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().is_ok_and(|guard| guard.is_none())
        });
        if empty {
            slots.pop(name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("vector_store_dir", &self.vector_store_dir)
            .field("score_threshold", &self.score_threshold)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A slot may go when no caller holds a handle and nothing is unsaved.
fn is_idle(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1
        && slot
            .try_lock()
            .is_ok_and(|guard| guard.as_ref().map_or(true, |store| !store.is_dirty()))
}

/// Evict idle slots, least recently used first, until `capacity` is met.
fn evict_idle(slots: &mut LruCache<String, Slot>, capacity: usize) {
    if slots.len() <= capacity {
        return;
    }

    let excess = slots.len() - capacity;
    let victims: Vec<String> = slots
        .iter()
        .rev()
        .filter(|(_, slot)| is_idle(slot))
        .map(|(name, _)| name.clone())
        .take(excess)
        .collect();

    for name in &victims {
        slots.pop(name);
        debug!("Evicted idle index '{}' from memory", name);
    }

    if slots.len() > capacity {
        debug!(
            "Index cache holds {} entries over capacity {}; the rest are busy or unsaved",
            slots.len(),
            capacity
        );
    }
}

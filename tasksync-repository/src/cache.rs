//! In-memory cache of tasks plus the dirty flag.
//!
//! The map and the flag form one unit: they are only ever read or written
//! together under a single lock ([`SharedCache`]), so a reader that observes
//! `dirty == false` always observes the map written by the same update.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tasksync_core::Task;
use tracing::debug;

/// Ordered `id -> Task` map with a dirty flag.
///
/// Invariants:
/// - every key equals the `id` of its task; tasks without an id are never stored
/// - a full write clears the map before inserting, leaving no stale entries
/// - `dirty` is cleared only by [`CacheStore::apply_remote_snapshot`]
/// - once clean, the map changes only through remote writes or [`CacheStore::invalidate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    entries: IndexMap<String, Task>,
    dirty: bool,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            dirty: true,
        }
    }
}

impl CacheStore {
    /// Empty and dirty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The cache may stand in for the sources only when it is clean and
    /// non-empty. A clean but empty cache is not trusted.
    pub fn is_trusted(&self) -> bool {
        !self.dirty && !self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of all tasks in insertion order.
    pub fn values(&self) -> Vec<Task> {
        self.entries.values().cloned().collect()
    }

    /// Tasks whose title or description starts with `text`, ignoring case,
    /// in insertion order.
    pub fn search(&self, text: &str) -> Vec<Task> {
        self.entries
            .values()
            .filter(|task| task.matches_prefix(text))
            .cloned()
            .collect()
    }

    /// Clear, then insert every task. Leaves the dirty flag untouched.
    pub fn replace_all(&mut self, tasks: &[Task]) {
        self.entries.clear();
        for task in tasks {
            self.upsert(task);
        }
        debug!(cached = self.entries.len(), "Cache replaced");
    }

    /// Full write from the authoritative source: replace and mark clean.
    pub fn apply_remote_snapshot(&mut self, tasks: &[Task]) {
        self.replace_all(tasks);
        self.dirty = false;
    }

    /// Full write from a non-authoritative source.
    ///
    /// Ignored while the cache holds a remote snapshot; returns whether the
    /// map was replaced.
    pub fn replace_from_local(&mut self, tasks: &[Task]) -> bool {
        if !self.dirty {
            debug!(fetched = tasks.len(), "Clean cache kept over local collection");
            return false;
        }
        self.replace_all(tasks);
        true
    }

    /// Single-task write from a non-authoritative source. Ignored while the
    /// cache is clean.
    pub fn upsert_from_local(&mut self, task: &Task) -> bool {
        self.dirty && self.upsert(task)
    }

    /// Insert or replace one task without touching other entries.
    ///
    /// Returns false for a task without an id, which is skipped.
    pub fn upsert(&mut self, task: &Task) -> bool {
        match task.id() {
            Some(id) => {
                self.entries.insert(id.to_string(), task.clone());
                true
            }
            None => false,
        }
    }

    /// Clear everything and mark dirty.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }
}

/// The engine's single guarded cache.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedCache {
    inner: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    /// Lock the cache, recovering from poisoning.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

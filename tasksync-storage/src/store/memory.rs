//! In-memory task store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use indexmap::IndexMap;
use tasksync_core::{Task, TaskError, TaskResult};

use super::{storage_key, TaskStore};

/// Insertion-ordered, process-local task store.
///
/// Used when no durable path is configured, and as the default local store
/// in tests.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<IndexMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `tasks`. Tasks without an id are skipped.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let map = tasks
            .into_iter()
            .filter_map(|task| task.id.clone().map(|id| (id, task)))
            .collect();
        Self {
            tasks: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> TaskResult<RwLockReadGuard<'_, IndexMap<String, Task>>> {
        self.tasks
            .read()
            .map_err(|_| TaskError::storage("store lock poisoned"))
    }

    fn write(&self) -> TaskResult<RwLockWriteGuard<'_, IndexMap<String, Task>>> {
        self.tasks
            .write()
            .map_err(|_| TaskError::storage("store lock poisoned"))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn fetch_all(&self) -> TaskResult<Vec<Task>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn fetch_one(&self, id: &str) -> TaskResult<Option<Task>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn upsert(&self, task: &Task) -> TaskResult<()> {
        let id = storage_key(task)?;
        self.write()?.insert(id.to_string(), task.clone());
        Ok(())
    }

    async fn upsert_all(&self, tasks: &[Task]) -> TaskResult<()> {
        // Validate first so a bad task leaves the store untouched.
        let keyed = tasks
            .iter()
            .map(|task| storage_key(task).map(|id| (id.to_string(), task.clone())))
            .collect::<TaskResult<Vec<_>>>()?;
        self.write()?.extend(keyed);
        Ok(())
    }

    async fn delete(&self, id: &str) -> TaskResult<bool> {
        Ok(self.write()?.shift_remove(id).is_some())
    }
}

//! Local storage engine contract and implementations.
//!
//! A [`TaskStore`] is the durable side of the local adapter: plain async CRUD
//! over tasks keyed by id, with upsert semantics on writes.

pub mod lmdb;
pub mod memory;

use async_trait::async_trait;
use tasksync_core::{Task, TaskError, TaskResult};

/// Async CRUD over persisted tasks.
///
/// # Implementation Requirements
///
/// - `upsert`/`upsert_all` replace any existing task with the same id
/// - tasks without an id are rejected with `TaskError::Storage`
/// - `upsert_all` is atomic: either every task is written or none is
/// - `delete` reports whether a task was removed
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All stored tasks, in the store's natural iteration order.
    async fn fetch_all(&self) -> TaskResult<Vec<Task>>;

    /// The task with `id`, if stored.
    async fn fetch_one(&self, id: &str) -> TaskResult<Option<Task>>;

    /// Insert or replace one task.
    async fn upsert(&self, task: &Task) -> TaskResult<()>;

    /// Insert or replace many tasks in one transaction.
    async fn upsert_all(&self, tasks: &[Task]) -> TaskResult<()>;

    /// Remove a task, returning whether it existed.
    async fn delete(&self, id: &str) -> TaskResult<bool>;
}

/// The id a task is stored under.
pub(crate) fn storage_key(task: &Task) -> TaskResult<&str> {
    task.id()
        .ok_or_else(|| TaskError::storage(format!("cannot store task without id: {:?}", task.title)))
}

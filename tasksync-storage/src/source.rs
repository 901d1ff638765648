//! The data source capability shared by the local and remote adapters.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tasksync_core::{Resource, Task, TaskResult};

/// Lazy, single-shot stream of fetch outcomes.
///
/// Nothing happens until the stream is polled; it ends after the underlying
/// fetch has produced its value(s). Failures arrive as `Resource::Failure`.
pub type ResourceStream<T> = BoxStream<'static, Resource<T>>;

/// Uniform capability implemented by every task source.
///
/// Reads return a fresh [`ResourceStream`] per call. Writes are
/// fire-and-forget from the engine's point of view: they report their outcome
/// so it can be logged, but nothing downstream waits on them for correctness.
/// Implementations must not retry internally.
#[async_trait]
pub trait TasksDataSource: Send + Sync {
    /// Fetch the full collection.
    fn fetch_all(&self) -> ResourceStream<Vec<Task>>;

    /// Fetch a single task. Absence is reported as `Failure(NotFound)`.
    fn fetch_one(&self, id: &str) -> ResourceStream<Task>;

    /// Persist a single task.
    async fn save(&self, task: &Task) -> TaskResult<()>;

    /// Persist a batch of tasks.
    async fn save_all(&self, tasks: &[Task]) -> TaskResult<()>;

    /// Remove a task by id.
    async fn delete(&self, id: &str) -> TaskResult<()>;
}

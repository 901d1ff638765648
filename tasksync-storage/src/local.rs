//! Local data source adapter over a [`TaskStore`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tasksync_core::{Resource, Task, TaskError, TaskResult};
use tracing::debug;

use crate::source::{ResourceStream, TasksDataSource};
use crate::store::TaskStore;

/// Local adapter: reads and writes go to the durable store.
pub struct LocalDataSource<S> {
    store: Arc<S>,
}

impl<S> LocalDataSource<S>
where
    S: TaskStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Clone for LocalDataSource<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<S> TasksDataSource for LocalDataSource<S>
where
    S: TaskStore + 'static,
{
    fn fetch_all(&self) -> ResourceStream<Vec<Task>> {
        let store = Arc::clone(&self.store);
        stream::once(async move {
            let result = store.fetch_all().await;
            debug!(ok = result.is_ok(), "Local fetch_all resolved");
            Resource::from(result)
        })
        .boxed()
    }

    fn fetch_one(&self, id: &str) -> ResourceStream<Task> {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        stream::once(async move {
            match store.fetch_one(&id).await {
                Ok(Some(task)) => Resource::Success(task),
                Ok(None) => Resource::Failure(TaskError::not_found(id)),
                Err(err) => Resource::Failure(err),
            }
        })
        .boxed()
    }

    async fn save(&self, task: &Task) -> TaskResult<()> {
        self.store.upsert(task).await
    }

    async fn save_all(&self, tasks: &[Task]) -> TaskResult<()> {
        self.store.upsert_all(tasks).await
    }

    async fn delete(&self, id: &str) -> TaskResult<()> {
        let removed = self.store.delete(id).await?;
        debug!(id, removed, "Local delete");
        Ok(())
    }
}

//! Remote data source adapter and the remote client contract.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tasksync_core::{Resource, Task, TaskError, TaskResult};
use tracing::{debug, warn};

use crate::source::{ResourceStream, TasksDataSource};

/// Client for the authoritative remote task service.
///
/// Returns raw records or a client-specific error; the adapter converts that
/// error into a [`TaskError`] at the boundary.
#[async_trait]
pub trait TasksApi: Send + Sync {
    type Error: Into<TaskError> + Send;

    /// Fetch the full collection.
    async fn fetch_tasks(&self) -> Result<Vec<Task>, Self::Error>;

    /// Fetch a single task.
    async fn fetch_task(&self, id: &str) -> Result<Task, Self::Error>;
}

/// Remote adapter. Read-mostly: writes are accepted and discarded.
pub struct RemoteDataSource<A> {
    api: Arc<A>,
}

impl<A> RemoteDataSource<A>
where
    A: TasksApi + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

impl<A> Clone for RemoteDataSource<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

fn into_resource<T, E: Into<TaskError>>(result: Result<T, E>) -> Resource<T> {
    match result {
        Ok(data) => Resource::Success(data),
        Err(err) => {
            let err = err.into();
            warn!(error = %err, "Remote request failed");
            Resource::Failure(err)
        }
    }
}

#[async_trait]
impl<A> TasksDataSource for RemoteDataSource<A>
where
    A: TasksApi + 'static,
{
    fn fetch_all(&self) -> ResourceStream<Vec<Task>> {
        let api = Arc::clone(&self.api);
        stream::once(async move {
            let result = api.fetch_tasks().await;
            if let Ok(tasks) = &result {
                debug!(count = tasks.len(), "Remote fetch_all resolved");
            }
            into_resource(result)
        })
        .boxed()
    }

    fn fetch_one(&self, id: &str) -> ResourceStream<Task> {
        let api = Arc::clone(&self.api);
        let id = id.to_string();
        stream::once(async move { into_resource(api.fetch_task(&id).await) }).boxed()
    }

    async fn save(&self, _task: &Task) -> TaskResult<()> {
        Ok(())
    }

    async fn save_all(&self, _tasks: &[Task]) -> TaskResult<()> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> TaskResult<()> {
        Ok(())
    }
}

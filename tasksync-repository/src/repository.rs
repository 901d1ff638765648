//! Reconciliation engine over a local and a remote data source.
//!
//! Reads go cache-first when the cache can be trusted, otherwise to the local
//! source, and always to the remote source after a short delay. Branches run
//! concurrently and their outcomes are merged without letting one branch's
//! failure cut the other short. Collection results are multicast through a
//! [`BroadcastHub`]; single-task lookups are returned to the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{future, StreamExt};
use tasksync_core::config::DEFAULT_REMOTE_DELAY_MS;
use tasksync_core::{Resource, Task};
use tasksync_storage::TasksDataSource;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::SharedCache;
use crate::hub::{BroadcastHub, HubSubscription};
use crate::merge::{deferred, merge_delay_error, MergedStream};
use crate::supersede::OperationSlot;

/// What flows through the hub: collection outcomes from loads and searches.
pub type TasksResource = Resource<Vec<Task>>;

/// Stream returned by [`TasksRepository::get_one`].
pub type TaskStream = MergedStream<Resource<Task>>;

/// Configuration for the repository.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Delay before the remote branch starts, so the cache or local branch
    /// is observed first.
    pub remote_delay: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            remote_delay: Duration::from_millis(DEFAULT_REMOTE_DELAY_MS),
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote branch delay.
    pub fn with_remote_delay(mut self, delay: Duration) -> Self {
        self.remote_delay = delay;
        self
    }
}

/// How a load or search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every branch finished and every emission was published.
    Settled,
    /// A newer operation of the same kind started first; remaining
    /// emissions were discarded.
    Superseded,
}

/// Handle to a running load or search.
///
/// Awaiting it waits for the operation to settle. Dropping it does not
/// cancel the operation; only a newer operation of the same kind does.
#[derive(Debug)]
pub struct OperationHandle {
    task: JoinHandle<Completion>,
}

impl OperationHandle {
    fn new(task: JoinHandle<Completion>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for OperationHandle {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Completion> {
        match ready!(Pin::new(&mut self.task).poll(cx)) {
            Ok(completion) => Poll::Ready(completion),
            Err(err) if err.is_cancelled() => Poll::Ready(Completion::Superseded),
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Cache,
    Local,
    Remote,
}

struct Inner<L, R> {
    local: Arc<L>,
    remote: Arc<R>,
    cache: SharedCache,
    hub: BroadcastHub<TasksResource>,
    load_slot: OperationSlot,
    search_slot: OperationSlot,
    config: RepositoryConfig,
}

/// Read-through cache reconciling a local and a remote [`TasksDataSource`].
///
/// # Type Parameters
///
/// - `L`: the local source, which also receives write-backs
/// - `R`: the remote, authoritative source
///
/// # Example
///
/// ```ignore
/// let repo = TasksRepository::with_defaults(local, remote);
/// let mut results = repo.subscribe();
///
/// repo.load_all().await;
/// while let Some(resource) = results.try_recv() {
///     println!("{resource:?}");
/// }
/// ```
///
/// Must be used from within a tokio runtime.
pub struct TasksRepository<L, R> {
    inner: Arc<Inner<L, R>>,
}

impl<L, R> Clone for TasksRepository<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, R> TasksRepository<L, R>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
{
    /// Create a repository with an empty, dirty cache.
    pub fn new(local: Arc<L>, remote: Arc<R>, config: RepositoryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                cache: SharedCache::default(),
                hub: BroadcastHub::new(),
                load_slot: OperationSlot::new("load_all"),
                search_slot: OperationSlot::new("search"),
                config,
            }),
        }
    }

    /// Create a repository with default configuration.
    pub fn with_defaults(local: Arc<L>, remote: Arc<R>) -> Self {
        Self::new(local, remote, RepositoryConfig::default())
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.inner.config
    }

    pub fn local(&self) -> &L {
        &self.inner.local
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    /// Load the whole collection and publish every outcome on the hub.
    ///
    /// The first branch replays the cache when it is clean and non-empty,
    /// otherwise it reads the local source. The remote branch always runs,
    /// after [`RepositoryConfig::remote_delay`]; its success replaces the
    /// cache, marks it clean and is written back to the local source.
    ///
    /// Supersedes any load still in flight.
    pub fn load_all(&self) -> OperationHandle {
        let inner = &self.inner;
        let cached = {
            let cache = inner.cache.lock();
            info!(dirty = cache.is_dirty(), cached = cache.len(), "load_all");
            cache.is_trusted().then(|| cache.values())
        };

        let first: BoxStream<'static, (Branch, TasksResource)> = match cached {
            Some(tasks) => stream::once(future::ready((Branch::Cache, Resource::Success(tasks))))
                .boxed(),
            None => inner
                .local
                .fetch_all()
                .map(|resource| (Branch::Local, resource))
                .boxed(),
        };
        let remote_source = Arc::clone(&inner.remote);
        let remote = deferred(inner.config.remote_delay, move || remote_source.fetch_all())
            .map(|resource| (Branch::Remote, resource))
            .boxed();

        let generation = inner.load_slot.begin();
        let task_inner = Arc::clone(inner);
        let task = tokio::spawn(async move {
            let mut merged = merge_delay_error(vec![first, remote]);
            while let Some((branch, resource)) = merged.next().await {
                let applied = task_inner.load_slot.run_if_current(generation, || {
                    task_inner.apply_load(branch, resource)
                });
                match applied {
                    Some(Some(fetched)) => task_inner.write_back(&fetched).await,
                    Some(None) => {}
                    None => return Completion::Superseded,
                }
            }
            Completion::Settled
        });
        inner.load_slot.attach(generation, task.abort_handle());
        OperationHandle::new(task)
    }

    /// Look up one task. Emissions go to the returned stream, not the hub.
    ///
    /// The first branch serves the cached task when the cache is clean,
    /// non-empty and holds `id`, otherwise it reads the local source and
    /// caches a hit unless a remote snapshot already marked the cache clean. The remote branch always runs after the delay; a hit is
    /// cached and saved locally, a failure reaches the caller.
    pub fn get_one(&self, id: &str) -> TaskStream {
        let inner = &self.inner;
        let cached = {
            let cache = inner.cache.lock();
            info!(id, dirty = cache.is_dirty(), cached = cache.len(), "get_one");
            if cache.is_trusted() {
                cache.get(id).cloned()
            } else {
                None
            }
        };

        let first: BoxStream<'static, Resource<Task>> = match cached {
            Some(task) => stream::once(future::ready(Resource::Success(task))).boxed(),
            None => {
                let cache = inner.cache.clone();
                inner
                    .local
                    .fetch_one(id)
                    .inspect(move |resource| {
                        if let Resource::Success(task) = resource {
                            cache.lock().upsert_from_local(task);
                        }
                    })
                    .boxed()
            }
        };

        let remote_source = Arc::clone(&inner.remote);
        let remote_id = id.to_string();
        let task_inner = Arc::clone(inner);
        let remote = deferred(inner.config.remote_delay, move || {
            remote_source.fetch_one(&remote_id)
        })
        .then(move |resource| {
            let inner = Arc::clone(&task_inner);
            async move {
                match &resource {
                    Resource::Success(task) => {
                        inner.cache.lock().upsert(task);
                        if let Err(err) = inner.local.save(task).await {
                            warn!(id = ?task.id(), error = %err, "Failed to save task locally");
                        }
                    }
                    Resource::Failure(err) => {
                        warn!(error = %err, "Remote get_one failed");
                    }
                    Resource::Loading => {}
                }
                resource
            }
        })
        .boxed();

        merge_delay_error(vec![first, remote])
    }

    /// Publish the tasks whose title or description starts with `text`,
    /// ignoring case.
    ///
    /// Scans the cache when it is non-empty, otherwise reads the local source
    /// (filling the cache) and scans that. Supersedes any search still in
    /// flight.
    pub fn search(&self, text: &str) -> OperationHandle {
        let inner = &self.inner;
        let text = text.to_string();
        let snapshot = {
            let cache = inner.cache.lock();
            info!(%text, cached = cache.len(), "search");
            (!cache.is_empty()).then(|| cache.values())
        };

        let generation = inner.search_slot.begin();
        let task_inner = Arc::clone(inner);
        let task = match snapshot {
            Some(tasks) => tokio::spawn(async move {
                let matches = filter_tasks(&tasks, &text);
                task_inner.publish_search(generation, Resource::Success(matches), None)
            }),
            None => {
                let mut source = inner.local.fetch_all();
                tokio::spawn(async move {
                    while let Some(resource) = source.next().await {
                        let completion = match resource {
                            Resource::Success(tasks) => {
                                let matches = filter_tasks(&tasks, &text);
                                task_inner.publish_search(
                                    generation,
                                    Resource::Success(matches),
                                    Some(tasks.as_slice()),
                                )
                            }
                            Resource::Failure(err) => {
                                warn!(error = %err, "Local fetch for search failed");
                                task_inner.publish_search(generation, Resource::Failure(err), None)
                            }
                            Resource::Loading => continue,
                        };
                        if completion == Completion::Superseded {
                            return completion;
                        }
                    }
                    Completion::Settled
                })
            }
        };
        inner.search_slot.attach(generation, task.abort_handle());
        OperationHandle::new(task)
    }

    /// Clear the cache and mark it dirty. Does not load.
    pub fn refresh(&self) {
        self.inner.cache.lock().invalidate();
        info!("Cache invalidated");
    }

    /// Attach a subscriber to the hub. It first receives the latest value.
    pub fn subscribe(&self) -> HubSubscription<TasksResource> {
        self.inner.hub.subscribe()
    }

    /// Attach a callback observer to the hub on a spawned task.
    pub fn subscribe_with<F>(&self, on_value: F) -> JoinHandle<()>
    where
        F: FnMut(TasksResource) + Send + 'static,
    {
        self.inner.hub.subscribe_with(on_value)
    }

    /// Snapshot of the cache in insertion order.
    pub fn cached_tasks(&self) -> Vec<Task> {
        self.inner.cache.lock().values()
    }

    pub fn is_cache_dirty(&self) -> bool {
        self.inner.cache.lock().is_dirty()
    }

    /// Latest value published on the hub.
    pub fn last_published(&self) -> Option<TasksResource> {
        self.inner.hub.last()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.subscriber_count()
    }
}

impl<L, R> Inner<L, R>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
{
    /// Apply one load emission to the cache and publish it.
    ///
    /// Returns the remote collection to write back locally, if any.
    fn apply_load(&self, branch: Branch, resource: TasksResource) -> Option<Vec<Task>> {
        let mut fetched = None;
        match (&branch, &resource) {
            (Branch::Local, Resource::Success(tasks)) => {
                self.cache.lock().replace_from_local(tasks);
            }
            (Branch::Remote, Resource::Success(tasks)) => {
                self.cache.lock().apply_remote_snapshot(tasks);
                fetched = Some(tasks.clone());
            }
            (_, Resource::Failure(err)) => {
                warn!(?branch, error = %err, "load_all branch failed");
            }
            _ => {}
        }
        debug!(?branch, success = resource.is_success(), "load_all emission");
        self.hub.publish(resource);
        fetched
    }

    async fn write_back(&self, tasks: &[Task]) {
        if let Err(err) = self.local.save_all(tasks).await {
            warn!(count = tasks.len(), error = %err, "Failed to save remote tasks locally");
        }
    }

    fn publish_search(
        &self,
        generation: u64,
        resource: TasksResource,
        fill_cache: Option<&[Task]>,
    ) -> Completion {
        let published = self.search_slot.run_if_current(generation, || {
            if let Some(tasks) = fill_cache {
                self.cache.lock().replace_from_local(tasks);
            }
            self.hub.publish(resource)
        });
        match published {
            Some(receivers) => {
                debug!(receivers, "search result published");
                Completion::Settled
            }
            None => Completion::Superseded,
        }
    }
}

fn filter_tasks(tasks: &[Task], text: &str) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.matches_prefix(text))
        .cloned()
        .collect()
}

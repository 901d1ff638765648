//! tasksync Test Utilities
//!
//! Shared test infrastructure for the tasksync workspace:
//! - A scripted data source with call recording
//! - Proptest generators for tasks and errors
//! - Fixtures for common scenarios
//! - Assertions over `Resource` values

pub use tasksync_core::{ErrorKind, Resource, Task, TaskError, TaskResult};

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{future, stream, StreamExt};
use tasksync_storage::{ResourceStream, TasksDataSource};

// ============================================================================
// SCRIPTED DATA SOURCE
// ============================================================================

/// What one read call on a [`ScriptedDataSource`] produces.
#[derive(Debug, Clone)]
pub enum Script<T> {
    /// Emit these values immediately, then complete.
    Emit(Vec<Resource<T>>),
    /// Wait, then emit these values and complete.
    EmitAfter(Duration, Vec<Resource<T>>),
    /// Never emit and never complete.
    Never,
}

impl<T> Script<T> {
    pub fn success(value: T) -> Self {
        Script::Emit(vec![Resource::Success(value)])
    }

    pub fn failure(error: TaskError) -> Self {
        Script::Emit(vec![Resource::Failure(error)])
    }

    pub fn success_after(delay: Duration, value: T) -> Self {
        Script::EmitAfter(delay, vec![Resource::Success(value)])
    }
}

impl<T> Script<T>
where
    T: Send + 'static,
{
    fn play(self) -> ResourceStream<T> {
        match self {
            Script::Emit(values) => stream::iter(values).boxed(),
            Script::EmitAfter(delay, values) => stream::once(async move {
                tokio::time::sleep(delay).await;
                stream::iter(values)
            })
            .flatten()
            .boxed(),
            Script::Never => stream::pending().boxed(),
        }
    }
}

/// Scripts consumed in order; the last one repeats for every later call.
#[derive(Debug)]
struct ScriptQueue<T> {
    queued: VecDeque<Script<T>>,
    repeat: Script<T>,
}

impl<T: Clone> ScriptQueue<T> {
    fn new(repeat: Script<T>) -> Self {
        Self {
            queued: VecDeque::new(),
            repeat,
        }
    }

    fn push(&mut self, script: Script<T>) {
        self.queued.push_back(script);
    }

    fn next(&mut self) -> Script<T> {
        match self.queued.pop_front() {
            Some(script) => {
                if self.queued.is_empty() {
                    self.repeat = script.clone();
                }
                script
            }
            None => self.repeat.clone(),
        }
    }
}

#[derive(Debug)]
struct ScriptState {
    fetch_all: ScriptQueue<Vec<Task>>,
    fetch_one: HashMap<String, ScriptQueue<Task>>,
    write_error: Option<TaskError>,
    fetch_all_calls: usize,
    fetch_one_ids: Vec<String>,
    saved: Vec<Task>,
    saved_batches: Vec<Vec<Task>>,
    deleted: Vec<String>,
}

/// [`TasksDataSource`] whose reads follow a script and whose calls are
/// recorded.
///
/// Reads with no script never resolve, except `fetch_one` for an id with no
/// script, which fails with `NotFound`.
///
/// # Example
///
/// ```ignore
/// let remote = ScriptedDataSource::new();
/// remote.on_fetch_all(Script::success(fixtures::sample_tasks()));
/// remote.on_fetch_one("a", Script::failure(TaskError::transport("offline")));
/// ```
#[derive(Debug)]
pub struct ScriptedDataSource {
    state: Mutex<ScriptState>,
}

impl Default for ScriptedDataSource {
    fn default() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                fetch_all: ScriptQueue::new(Script::Never),
                fetch_one: HashMap::new(),
                write_error: None,
                fetch_all_calls: 0,
                fetch_one_ids: Vec::new(),
                saved: Vec::new(),
                saved_batches: Vec::new(),
                deleted: Vec::new(),
            }),
        }
    }
}

impl ScriptedDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of the next `fetch_all` call.
    pub fn on_fetch_all(&self, script: Script<Vec<Task>>) -> &Self {
        self.lock().fetch_all.push(script);
        self
    }

    /// Queue the outcome of the next `fetch_one(id)` call.
    pub fn on_fetch_one(&self, id: &str, script: Script<Task>) -> &Self {
        self.lock()
            .fetch_one
            .entry(id.to_string())
            .or_insert_with(|| ScriptQueue::new(Script::Never))
            .push(script);
        self
    }

    /// Make every later write fail with `error`.
    pub fn fail_writes(&self, error: TaskError) -> &Self {
        self.lock().write_error = Some(error);
        self
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.lock().fetch_all_calls
    }

    pub fn fetch_one_calls(&self) -> usize {
        self.lock().fetch_one_ids.len()
    }

    /// Ids passed to `fetch_one`, in call order.
    pub fn fetch_one_ids(&self) -> Vec<String> {
        self.lock().fetch_one_ids.clone()
    }

    pub fn save_calls(&self) -> usize {
        self.lock().saved.len()
    }

    /// Tasks passed to `save`, in call order.
    pub fn saved(&self) -> Vec<Task> {
        self.lock().saved.clone()
    }

    pub fn save_all_calls(&self) -> usize {
        self.lock().saved_batches.len()
    }

    /// Batches passed to `save_all`, in call order.
    pub fn saved_batches(&self) -> Vec<Vec<Task>> {
        self.lock().saved_batches.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }
}

#[async_trait]
impl TasksDataSource for ScriptedDataSource {
    fn fetch_all(&self) -> ResourceStream<Vec<Task>> {
        let mut state = self.lock();
        state.fetch_all_calls += 1;
        state.fetch_all.next().play()
    }

    fn fetch_one(&self, id: &str) -> ResourceStream<Task> {
        let mut state = self.lock();
        state.fetch_one_ids.push(id.to_string());
        match state.fetch_one.get_mut(id) {
            Some(queue) => queue.next().play(),
            None => stream::once(future::ready(Resource::Failure(TaskError::not_found(id)))).boxed(),
        }
    }

    async fn save(&self, task: &Task) -> TaskResult<()> {
        let mut state = self.lock();
        state.saved.push(task.clone());
        state.write_error.clone().map_or(Ok(()), Err)
    }

    async fn save_all(&self, tasks: &[Task]) -> TaskResult<()> {
        let mut state = self.lock();
        state.saved_batches.push(tasks.to_vec());
        state.write_error.clone().map_or(Ok(()), Err)
    }

    async fn delete(&self, id: &str) -> TaskResult<()> {
        let mut state = self.lock();
        state.deleted.push(id.to_string());
        state.write_error.clone().map_or(Ok(()), Err)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tasksync types.

    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    /// Generate a random task id.
    pub fn arb_task_id() -> impl Strategy<Value = String> {
        any::<[u8; 16]>().prop_map(|bytes| Uuid::from_bytes(bytes).to_string())
    }

    /// Short free text, mixed case.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z ]{0,15}"
    }

    /// Search input: a short prefix, possibly empty.
    pub fn arb_search_text() -> impl Strategy<Value = String> {
        "[a-zA-Z]{0,3}"
    }

    /// Generate a persisted task.
    pub fn arb_task() -> impl Strategy<Value = Task> {
        (arb_task_id(), arb_text(), prop::option::of(arb_text())).prop_map(
            |(id, title, description)| Task::new(id, title, description.unwrap_or_default()),
        )
    }

    /// Generate a task that has not been assigned an id.
    pub fn arb_draft_task() -> impl Strategy<Value = Task> {
        (arb_text(), arb_text()).prop_map(|(title, description)| Task::draft(title, description))
    }

    /// Up to `max` persisted tasks with distinct ids.
    pub fn arb_tasks(max: usize) -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec(arb_task(), 0..=max).prop_map(|tasks| {
            let mut seen = HashSet::new();
            tasks
                .into_iter()
                .filter(|task| task.id().map_or(false, |id| seen.insert(id.to_string())))
                .collect()
        })
    }

    pub fn arb_task_error() -> impl Strategy<Value = TaskError> {
        prop_oneof![
            arb_text().prop_map(TaskError::transport),
            arb_text().prop_map(TaskError::storage),
            arb_task_id().prop_map(TaskError::not_found),
            arb_text().prop_map(TaskError::unknown),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// Two tasks: "1" titled "test" and "2" titled "some".
    pub fn sample_tasks() -> Vec<Task> {
        vec![Task::new("1", "test", ""), Task::new("2", "some", "")]
    }

    /// A single task with id "a".
    pub fn task_a() -> Task {
        Task::new("a", "title a", "description a")
    }

    /// The same id as [`task_a`] with different content.
    pub fn task_a_updated() -> Task {
        Task::new("a", "title a (remote)", "description a")
    }

    pub fn transport_error() -> TaskError {
        TaskError::transport("connection reset")
    }

    pub fn storage_error() -> TaskError {
        TaskError::storage("disk full")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `Resource` values.

    use super::*;
    use std::fmt::Debug;

    /// Assert that a resource is `Success(expected)`.
    #[track_caller]
    pub fn assert_success<T: Debug + PartialEq>(resource: &Resource<T>, expected: &T) {
        match resource {
            Resource::Success(data) => assert_eq!(data, expected),
            other => panic!("Expected Success({:?}), got: {:?}", expected, other),
        }
    }

    /// Assert that a resource is a `Failure` of the given kind.
    #[track_caller]
    pub fn assert_failure_kind<T: Debug>(resource: &Resource<T>, kind: ErrorKind) {
        match resource {
            Resource::Failure(err) => {
                assert_eq!(err.kind(), kind, "Wrong error kind in Failure: {}", err)
            }
            other => panic!("Expected {:?} failure, got: {:?}", kind, other),
        }
    }
}

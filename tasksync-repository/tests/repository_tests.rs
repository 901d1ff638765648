//! Behaviour of the reconciliation engine against scripted data sources.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use proptest::prelude::*;
use tasksync_core::{ErrorKind, Resource, Task};
use tasksync_repository::{Completion, RepositoryConfig, TasksRepository};
use tasksync_test_utils::assertions::{assert_failure_kind, assert_success};
use tasksync_test_utils::fixtures::{
    sample_tasks, storage_error, task_a, task_a_updated, transport_error,
};
use tasksync_test_utils::generators::{arb_search_text, arb_task_error, arb_tasks};
use tasksync_test_utils::{Script, ScriptedDataSource};
use tokio::time::{sleep, timeout, Instant};

type Repo = TasksRepository<ScriptedDataSource, ScriptedDataSource>;

fn sources() -> (Arc<ScriptedDataSource>, Arc<ScriptedDataSource>) {
    (
        Arc::new(ScriptedDataSource::new()),
        Arc::new(ScriptedDataSource::new()),
    )
}

fn repo(local: &Arc<ScriptedDataSource>, remote: &Arc<ScriptedDataSource>) -> Repo {
    TasksRepository::with_defaults(Arc::clone(local), Arc::clone(remote))
}

/// Run one load whose remote branch returns `tasks`, leaving the cache clean.
async fn warm(repo: &Repo, local: &ScriptedDataSource, remote: &ScriptedDataSource, tasks: Vec<Task>) {
    local.on_fetch_all(Script::success(vec![]));
    remote.on_fetch_all(Script::success(tasks));
    assert_eq!(repo.load_all().await, Completion::Settled);
}

// ============================================================================
// load_all
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cold_load_publishes_local_then_remote() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    remote.on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    assert_eq!(repo.load_all().await, Completion::Settled);

    assert_eq!(
        results.drain(),
        vec![
            Resource::Success(sample_tasks()),
            Resource::Success(vec![task_a()]),
        ]
    );
    assert_eq!(repo.cached_tasks(), vec![task_a()]);
    assert!(!repo.is_cache_dirty());
    assert_eq!(local.saved_batches(), vec![vec![task_a()]]);
}

#[tokio::test(start_paused = true)]
async fn test_remote_branch_starts_after_delay() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    remote.on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    let start = Instant::now();
    let handle = repo.load_all();

    assert_success(&results.recv().await.unwrap(), &sample_tasks());
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(remote.fetch_all_calls(), 0);

    assert_success(&results.recv().await.unwrap(), &vec![task_a()]);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(handle.await, Completion::Settled);
}

#[tokio::test(start_paused = true)]
async fn test_trusted_cache_is_first_emission_without_fetch() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, sample_tasks()).await;
    assert_eq!(local.fetch_all_calls(), 1);
    assert_eq!(remote.fetch_all_calls(), 1);

    let mut results = repo.subscribe();
    assert_eq!(results.drain(), vec![Resource::Success(sample_tasks())]);

    let handle = repo.load_all();
    let first = results.recv().await.unwrap();

    assert_success(&first, &sample_tasks());
    assert_eq!(local.fetch_all_calls(), 1);
    assert_eq!(remote.fetch_all_calls(), 1);

    assert_eq!(handle.await, Completion::Settled);
    assert_eq!(local.fetch_all_calls(), 1);
    assert_eq!(remote.fetch_all_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_local_failure_does_not_stop_remote() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::failure(storage_error()));
    remote.on_fetch_all(Script::success(sample_tasks()));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    assert_eq!(repo.load_all().await, Completion::Settled);

    let emitted = results.drain();
    assert_eq!(emitted.len(), 2);
    assert_failure_kind(&emitted[0], ErrorKind::Storage);
    assert_success(&emitted[1], &sample_tasks());
    assert_eq!(repo.cached_tasks(), sample_tasks());
    assert!(!repo.is_cache_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_keeps_hub_alive() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    remote
        .on_fetch_all(Script::failure(transport_error()))
        .on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    assert_eq!(repo.load_all().await, Completion::Settled);
    let emitted = results.drain();
    assert_success(&emitted[0], &sample_tasks());
    assert_failure_kind(&emitted[1], ErrorKind::Transport);
    assert_eq!(repo.cached_tasks(), sample_tasks());
    assert!(repo.is_cache_dirty());
    assert_eq!(local.save_all_calls(), 0);

    assert_eq!(repo.load_all().await, Completion::Settled);
    let emitted = results.drain();
    assert_eq!(emitted.last(), Some(&Resource::Success(vec![task_a()])));
    assert!(!repo.is_cache_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_clean_but_empty_cache_queries_both_sources() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, vec![]).await;
    assert!(!repo.is_cache_dirty());
    assert!(repo.cached_tasks().is_empty());

    assert_eq!(repo.load_all().await, Completion::Settled);
    assert_eq!(local.fetch_all_calls(), 2);
    assert_eq!(remote.fetch_all_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_replaced_without_stale_entries() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(vec![]));
    remote
        .on_fetch_all(Script::success(sample_tasks()))
        .on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);

    repo.load_all().await;
    assert_eq!(repo.cached_tasks(), sample_tasks());

    repo.load_all().await;
    assert_eq!(repo.cached_tasks(), vec![task_a()]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_back_is_not_fatal() {
    let (local, remote) = sources();
    local
        .on_fetch_all(Script::success(vec![]))
        .fail_writes(storage_error());
    remote.on_fetch_all(Script::success(sample_tasks()));
    let repo = repo(&local, &remote);

    assert_eq!(repo.load_all().await, Completion::Settled);
    assert_eq!(local.save_all_calls(), 1);
    assert_eq!(repo.cached_tasks(), sample_tasks());
    assert_eq!(repo.last_published(), Some(Resource::Success(sample_tasks())));
}

#[tokio::test(start_paused = true)]
async fn test_new_load_supersedes_running_load() {
    let stale = vec![Task::new("stale", "from first load", "")];
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(vec![]));
    remote
        .on_fetch_all(Script::success_after(Duration::from_millis(200), stale.clone()))
        .on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    let first = repo.load_all();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(remote.fetch_all_calls(), 1);

    let second = repo.load_all();
    assert_eq!(first.await, Completion::Superseded);
    assert_eq!(second.await, Completion::Settled);
    sleep(Duration::from_millis(500)).await;

    let emitted = results.drain();
    assert!(emitted.iter().all(|r| r.data() != Some(&stale)));
    assert_eq!(emitted.last(), Some(&Resource::Success(vec![task_a()])));
    assert_eq!(repo.cached_tasks(), vec![task_a()]);
    assert_eq!(local.saved_batches(), vec![vec![task_a()]]);
}

#[tokio::test(start_paused = true)]
async fn test_custom_remote_delay() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(vec![]));
    remote.on_fetch_all(Script::success(sample_tasks()));
    let config = RepositoryConfig::new().with_remote_delay(Duration::from_secs(2));
    let repo = TasksRepository::new(Arc::clone(&local), Arc::clone(&remote), config);

    assert_eq!(repo.config().remote_delay, Duration::from_secs(2));

    let start = Instant::now();
    repo.load_all().await;
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_slow_local_does_not_replace_remote_snapshot() {
    let old = vec![Task::new("old", "from local store", "")];
    let new = vec![Task::new("new", "from remote", "")];
    let (local, remote) = sources();
    local.on_fetch_all(Script::success_after(Duration::from_millis(300), old.clone()));
    remote.on_fetch_all(Script::success(new.clone()));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    assert_eq!(repo.load_all().await, Completion::Settled);

    assert_eq!(
        results.drain(),
        vec![Resource::Success(new.clone()), Resource::Success(old)]
    );
    assert_eq!(repo.cached_tasks(), new);
    assert!(!repo.is_cache_dirty());
    assert_eq!(repo.local().saved_batches(), vec![new.clone()]);

    let handle = repo.load_all();
    assert_success(&results.recv().await.unwrap(), &new);
    assert_eq!(repo.local().fetch_all_calls(), 1);
    assert_eq!(handle.await, Completion::Settled);
    assert_eq!(repo.remote().fetch_all_calls(), 2);
}

// ============================================================================
// get_one
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_get_one_remote_only_saves_locally_once() {
    let (local, remote) = sources();
    local.on_fetch_one("a", Script::Never);
    remote.on_fetch_one("a", Script::success(task_a()));
    let repo = repo(&local, &remote);

    let mut stream = repo.get_one("a");
    assert_eq!(stream.next().await, Some(Resource::Success(task_a())));
    assert!(timeout(Duration::from_secs(5), stream.next()).await.is_err());

    assert_eq!(local.saved(), vec![task_a()]);
    assert_eq!(local.save_calls(), 1);
    assert_eq!(repo.cached_tasks(), vec![task_a()]);
}

#[tokio::test(start_paused = true)]
async fn test_get_one_from_trusted_cache() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, vec![task_a()]).await;
    remote.on_fetch_one("a", Script::success(task_a_updated()));

    let emitted: Vec<_> = repo.get_one("a").collect().await;

    assert_eq!(
        emitted,
        vec![
            Resource::Success(task_a()),
            Resource::Success(task_a_updated()),
        ]
    );
    assert_eq!(local.fetch_one_calls(), 0);
    assert_eq!(repo.cached_tasks(), vec![task_a_updated()]);
}

#[tokio::test(start_paused = true)]
async fn test_get_one_missing_from_trusted_cache_reads_local() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, sample_tasks()).await;
    local.on_fetch_one("a", Script::success(task_a()));
    remote.on_fetch_one("a", Script::success(task_a()));

    let emitted: Vec<_> = repo.get_one("a").collect().await;

    assert_eq!(emitted.len(), 2);
    assert_eq!(local.fetch_one_ids(), vec!["a".to_string()]);
    let mut expected = sample_tasks();
    expected.push(task_a());
    assert_eq!(repo.cached_tasks(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_get_one_slow_local_hit_leaves_clean_cache_alone() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, sample_tasks()).await;
    local.on_fetch_one("a", Script::success_after(Duration::from_millis(300), task_a()));
    remote.on_fetch_one("a", Script::failure(transport_error()));

    let emitted: Vec<_> = repo.get_one("a").collect().await;

    assert_eq!(emitted.len(), 2);
    assert_failure_kind(&emitted[0], ErrorKind::Transport);
    assert_success(&emitted[1], &task_a());
    assert_eq!(repo.cached_tasks(), sample_tasks());
    assert!(!repo.is_cache_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_get_one_remote_failure_reaches_caller() {
    let (local, remote) = sources();
    local.on_fetch_one("a", Script::success(task_a()));
    remote.on_fetch_one("a", Script::failure(transport_error()));
    let repo = repo(&local, &remote);

    let emitted: Vec<_> = repo.get_one("a").collect().await;

    assert_eq!(emitted.len(), 2);
    assert_success(&emitted[0], &task_a());
    assert_failure_kind(&emitted[1], ErrorKind::Transport);
    assert_eq!(repo.last_published(), None);
    assert_eq!(local.save_calls(), 0);
    assert_eq!(repo.cached_tasks(), vec![task_a()]);
}

#[tokio::test(start_paused = true)]
async fn test_get_one_local_upsert_keeps_other_entries() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    remote.on_fetch_all(Script::failure(transport_error()));
    let repo = repo(&local, &remote);
    repo.load_all().await;
    assert!(repo.is_cache_dirty());

    local.on_fetch_one("1", Script::success(Task::new("1", "test (edited)", "")));
    remote.on_fetch_one("1", Script::Never);
    let mut stream = repo.get_one("1");
    assert!(stream.next().await.is_some_and(|r| r.is_success()));

    let titles: Vec<_> = repo.cached_tasks().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["test (edited)", "some"]);
}

// ============================================================================
// search
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_search_scans_cache() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, sample_tasks()).await;
    let mut results = repo.subscribe();
    results.drain();

    assert_eq!(repo.search("test").await, Completion::Settled);
    assert_eq!(results.drain(), vec![Resource::Success(vec![Task::new("1", "test", "")])]);

    assert_eq!(repo.search("new").await, Completion::Settled);
    assert_eq!(results.drain(), vec![Resource::Success(vec![])]);

    assert_eq!(local.fetch_all_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_search_matches_description_ignoring_case() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(vec![
        Task::new("1", "groceries", "Buy milk"),
        Task::new("2", "build", "compile"),
        Task::new("3", "chores", "sweep"),
    ]));
    let repo = repo(&local, &remote);

    repo.search("BU").await;

    let ids: Vec<_> = repo
        .last_published()
        .and_then(Resource::into_data)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test(start_paused = true)]
async fn test_search_on_empty_cache_fills_from_local() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    let repo = repo(&local, &remote);

    assert_eq!(repo.search("so").await, Completion::Settled);

    assert_eq!(
        repo.last_published(),
        Some(Resource::Success(vec![Task::new("2", "some", "")]))
    );
    assert_eq!(repo.cached_tasks(), sample_tasks());
    assert!(repo.is_cache_dirty());
    assert_eq!(remote.fetch_all_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_search_forwards_local_failure() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::failure(storage_error()));
    let repo = repo(&local, &remote);

    repo.search("test").await;

    let last = repo.last_published().unwrap();
    assert_failure_kind(&last, ErrorKind::Storage);
    assert!(repo.cached_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_search_supersedes_first() {
    let (local, remote) = sources();
    local
        .on_fetch_all(Script::success_after(Duration::from_millis(50), sample_tasks()))
        .on_fetch_all(Script::success(sample_tasks()));
    let repo = repo(&local, &remote);
    let mut results = repo.subscribe();

    let first = repo.search("test");
    let second = repo.search("some");

    assert_eq!(second.await, Completion::Settled);
    assert_eq!(first.await, Completion::Superseded);
    sleep(Duration::from_millis(200)).await;

    assert_eq!(
        results.drain(),
        vec![Resource::Success(vec![Task::new("2", "some", "")])]
    );
}

// ============================================================================
// refresh and subscription
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_is_idempotent() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    warm(&repo, &local, &remote, sample_tasks()).await;

    repo.refresh();
    let once = (repo.cached_tasks(), repo.is_cache_dirty());
    repo.refresh();

    assert_eq!((repo.cached_tasks(), repo.is_cache_dirty()), once);
    assert!(repo.cached_tasks().is_empty());
    assert!(repo.is_cache_dirty());

    repo.load_all().await;
    assert_eq!(local.fetch_all_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_sees_latest_only() {
    let (local, remote) = sources();
    local.on_fetch_all(Script::success(sample_tasks()));
    remote.on_fetch_all(Script::success(vec![task_a()]));
    let repo = repo(&local, &remote);

    repo.load_all().await;
    let mut late = repo.subscribe();

    assert_eq!(late.drain(), vec![Resource::Success(vec![task_a()])]);
}

#[tokio::test(start_paused = true)]
async fn test_loads_and_searches_share_one_channel() {
    let (local, remote) = sources();
    let repo = repo(&local, &remote);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer = repo.subscribe_with(move |resource| sink.lock().unwrap().push(resource));
    let mut other = repo.subscribe();
    assert_eq!(repo.subscriber_count(), 2);

    warm(&repo, &local, &remote, sample_tasks()).await;
    repo.search("some").await;
    sleep(Duration::from_millis(1)).await;

    let expected = vec![
        Resource::Success(vec![]),
        Resource::Success(sample_tasks()),
        Resource::Success(vec![Task::new("2", "some", "")]),
    ];
    assert_eq!(other.drain(), expected);
    assert_eq!(*seen.lock().unwrap(), expected);

    observer.abort();
    let _ = observer.await;
    drop(other);
    assert_eq!(repo.subscriber_count(), 0);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_cache_matches_latest_remote_collection(
        collections in prop::collection::vec(arb_tasks(6), 1..5)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (local, remote) = sources();
            local.on_fetch_all(Script::success(vec![]));
            for tasks in &collections {
                remote.on_fetch_all(Script::success(tasks.clone()));
            }
            let repo = repo(&local, &remote);

            for tasks in &collections {
                assert_eq!(repo.load_all().await, Completion::Settled);
                assert_eq!(&repo.cached_tasks(), tasks);
                assert!(!repo.is_cache_dirty());
            }
        });
    }

    #[test]
    fn prop_search_publishes_prefix_matches_in_cache_order(
        tasks in arb_tasks(10),
        text in arb_search_text(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (local, remote) = sources();
            let repo = repo(&local, &remote);
            warm(&repo, &local, &remote, tasks.clone()).await;

            assert_eq!(repo.search(&text).await, Completion::Settled);

            let expected: Vec<_> = tasks
                .iter()
                .filter(|task| task.matches_prefix(&text))
                .cloned()
                .collect();
            assert_eq!(repo.last_published(), Some(Resource::Success(expected)));
        });
    }

    #[test]
    fn prop_search_forwards_any_local_failure(
        error in arb_task_error(),
        text in arb_search_text(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (local, remote) = sources();
            local.on_fetch_all(Script::failure(error.clone()));
            let repo = repo(&local, &remote);

            assert_eq!(repo.search(&text).await, Completion::Settled);

            assert_eq!(repo.last_published(), Some(Resource::Failure(error)));
            assert!(repo.cached_tasks().is_empty());
            assert_eq!(remote.fetch_all_calls(), 0);
        });
    }
}

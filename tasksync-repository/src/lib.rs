//! tasksync Repository - Reconciliation Engine
//!
//! Keeps an in-memory view of the task collection in step with a local and
//! a remote [`TasksDataSource`](tasksync_storage::TasksDataSource), and
//! multicasts consolidated results to any number of subscribers.
//!
//! - [`CacheStore`]: ordered map plus dirty flag, guarded as one unit
//! - [`BroadcastHub`]: replay-last multicast of published values
//! - [`merge_delay_error`]: concurrent branches, failures as values
//! - [`TasksRepository`]: load, lookup, search and refresh policies

pub mod cache;
pub mod hub;
pub mod merge;
pub mod repository;
mod supersede;

pub use cache::CacheStore;
pub use hub::{BroadcastHub, HubSubscription};
pub use merge::{deferred, merge_delay_error, MergedStream};
pub use repository::{
    Completion, OperationHandle, RepositoryConfig, TaskStream, TasksRepository, TasksResource,
};

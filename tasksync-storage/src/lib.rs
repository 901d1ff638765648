//! tasksync Storage - Data Sources
//!
//! Defines the uniform [`TasksDataSource`] capability the reconciliation
//! engine talks to, and the two adapters implementing it:
//!
//! - [`LocalDataSource`] over any [`TaskStore`] (in-memory or LMDB)
//! - [`RemoteDataSource`] over any [`TasksApi`] (HTTP via reqwest)
//!
//! Adapters never retry and never block beyond their own I/O.

pub mod local;
pub mod remote;
pub mod source;
pub mod store;

pub use local::LocalDataSource;
pub use remote::http::{ApiClientError, HttpTasksApi};
pub use remote::{RemoteDataSource, TasksApi};
pub use source::{ResourceStream, TasksDataSource};
pub use store::lmdb::{LmdbStoreError, LmdbTaskStore};
pub use store::memory::InMemoryTaskStore;
pub use store::TaskStore;

//! tasksync Core - Entity Types
//!
//! Pure data structures shared by every tasksync crate: the cached record,
//! the tagged outcome wrapper that flows between data sources, the engine and
//! subscribers, the error taxonomy, and configuration.
//! This crate performs no I/O beyond reading configuration files.

pub mod config;
pub mod entities;
pub mod error;
pub mod resource;

pub use config::{ConfigError, RemoteConfig, StoreConfig, SyncConfig, TaskSyncConfig};
pub use entities::{ApiResponse, Task, TaskId};
pub use error::{ErrorKind, TaskError, TaskResult};
pub use resource::Resource;

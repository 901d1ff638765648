//! tasksync CLI
//!
//! Wires a local store and the remote HTTP client into a
//! [`TasksRepository`](tasksync_repository::TasksRepository) and exposes its
//! operations as subcommands.

pub mod args;
pub mod commands;
pub mod error;
pub mod telemetry;

//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Read-through task cache over a local store and a remote service.
#[derive(Debug, Parser)]
#[command(name = "tasksync", version, about)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "TASKSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Load every task and print each result until the load settles.
    Load,
    /// Look up one task by id.
    Get {
        id: String,
    },
    /// Print tasks whose title or description starts with TEXT.
    Search {
        text: String,
    },
    /// Print every published result until interrupted.
    Watch {
        /// Refresh and reload every N seconds.
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

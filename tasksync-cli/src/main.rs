//! tasksync entry point.

use std::sync::Arc;

use clap::Parser;
use tasksync_cli::args::Cli;
use tasksync_cli::commands;
use tasksync_cli::error::CliError;
use tasksync_cli::telemetry;
use tasksync_core::TaskSyncConfig;
use tasksync_repository::{RepositoryConfig, TasksRepository};
use tasksync_storage::{
    HttpTasksApi, InMemoryTaskStore, LmdbTaskStore, LocalDataSource, RemoteDataSource, TaskStore,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs)?;
    let config = TaskSyncConfig::load(cli.config.as_deref())?;
    info!(remote = %config.remote.base_url, store = ?config.store.path, "Configuration loaded");

    match &config.store.path {
        Some(path) => {
            let store = LmdbTaskStore::open(path, config.store.max_size_mb)?;
            run(&cli, &config, Arc::new(store)).await
        }
        None => {
            warn!("No store path configured, local tasks will not persist");
            run(&cli, &config, Arc::new(InMemoryTaskStore::new())).await
        }
    }
}

async fn run<S>(cli: &Cli, config: &TaskSyncConfig, store: Arc<S>) -> Result<(), CliError>
where
    S: TaskStore + 'static,
{
    let local = Arc::new(LocalDataSource::new(store));
    let api = HttpTasksApi::new(&config.remote)?;
    let remote = Arc::new(RemoteDataSource::new(Arc::new(api)));
    let repo_config = RepositoryConfig::new().with_remote_delay(config.sync.remote_delay());
    let repo = TasksRepository::new(local, remote, repo_config);

    let mut stdout = std::io::stdout();
    commands::run(&repo, &cli.command, &mut stdout).await
}

//! Command runners and output formatting.

use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;

use futures_util::StreamExt;
use tasksync_core::{Resource, Task, TaskError};
use tasksync_repository::{TasksRepository, TasksResource};
use tasksync_storage::TasksDataSource;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{info, warn};

use crate::args::Command;
use crate::error::CliError;

/// Run one command against `repo`, writing results to `out`.
pub async fn run<L, R, W>(
    repo: &TasksRepository<L, R>,
    command: &Command,
    out: &mut W,
) -> Result<(), CliError>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
    W: Write,
{
    match command {
        Command::Load => load(repo, out).await,
        Command::Get { id } => get(repo, id, out).await,
        Command::Search { text } => search(repo, text, out).await,
        Command::Watch { interval } => {
            let period = interval.map(Duration::from_secs);
            watch(repo, period, out, shutdown_signal()).await
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl-C");
    }
}

/// Print every published result of one load until it settles.
pub async fn load<L, R, W>(repo: &TasksRepository<L, R>, out: &mut W) -> Result<(), CliError>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
    W: Write,
{
    let mut results = repo.subscribe();
    results.drain();
    let mut handle = repo.load_all();
    loop {
        tokio::select! {
            Some(resource) = results.recv() => write_tasks(out, &resource)?,
            completion = &mut handle => {
                for resource in results.drain() {
                    write_tasks(out, &resource)?;
                }
                info!(?completion, "Load finished");
                return Ok(());
            }
        }
    }
}

/// Print each result of a single-task lookup.
pub async fn get<L, R, W>(repo: &TasksRepository<L, R>, id: &str, out: &mut W) -> Result<(), CliError>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
    W: Write,
{
    let mut lookup = repo.get_one(id);
    while let Some(resource) = lookup.next().await {
        write_task(out, &resource)?;
    }
    Ok(())
}

/// Load, then print the tasks matching `text`.
pub async fn search<L, R, W>(
    repo: &TasksRepository<L, R>,
    text: &str,
    out: &mut W,
) -> Result<(), CliError>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
    W: Write,
{
    repo.load_all().await;
    let mut results = repo.subscribe();
    results.drain();

    let completion = repo.search(text).await;
    info!(?completion, %text, "Search finished");
    for resource in results.drain() {
        write_tasks(out, &resource)?;
    }
    Ok(())
}

/// Print every published result until `shutdown` resolves. With `period`,
/// the cache is refreshed and reloaded on that schedule.
pub async fn watch<L, R, W, S>(
    repo: &TasksRepository<L, R>,
    period: Option<Duration>,
    out: &mut W,
    shutdown: S,
) -> Result<(), CliError>
where
    L: TasksDataSource + 'static,
    R: TasksDataSource + 'static,
    W: Write,
    S: Future<Output = ()>,
{
    let mut results = repo.subscribe();
    repo.load_all();
    let mut ticker = period.map(|period| interval_at(Instant::now() + period, period));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping watch");
                return Ok(());
            }
            Some(resource) = results.recv() => write_tasks(out, &resource)?,
            _ = tick(&mut ticker) => {
                repo.refresh();
                repo.load_all();
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub fn write_tasks<W: Write>(out: &mut W, resource: &TasksResource) -> io::Result<()> {
    match resource {
        Resource::Loading => writeln!(out, "loading..."),
        Resource::Success(tasks) => {
            writeln!(out, "{} task(s)", tasks.len())?;
            for task in tasks {
                write_task_line(out, task)?;
            }
            Ok(())
        }
        Resource::Failure(err) => write_failure(out, err),
    }
}

pub fn write_task<W: Write>(out: &mut W, resource: &Resource<Task>) -> io::Result<()> {
    match resource {
        Resource::Loading => writeln!(out, "loading..."),
        Resource::Success(task) => write_task_line(out, task),
        Resource::Failure(err) => write_failure(out, err),
    }
}

fn write_task_line<W: Write>(out: &mut W, task: &Task) -> io::Result<()> {
    let id = task.id().unwrap_or("-");
    if task.description.is_empty() {
        writeln!(out, "  [{}] {}", id, task.title)
    } else {
        writeln!(out, "  [{}] {} - {}", id, task.title, task.description)
    }
}

fn write_failure<W: Write>(out: &mut W, err: &TaskError) -> io::Result<()> {
    if err.is_retryable() {
        writeln!(out, "error: {} (retryable)", err)
    } else {
        writeln!(out, "error: {}", err)
    }
}

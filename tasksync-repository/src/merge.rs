//! Merging concurrent branches into one stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Run every branch concurrently and forward items as they are produced.
///
/// Failures travel as ordinary items, so no branch can cut another short:
/// the merged stream ends only once every branch has completed. Dropping the
/// merged stream cancels the branches that are still running.
///
/// Must be called from within a tokio runtime.
pub fn merge_delay_error<T>(branches: Vec<BoxStream<'static, T>>) -> MergedStream<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let tasks = branches
        .into_iter()
        .map(|mut branch| {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(item) = branch.next().await {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    MergedStream {
        items: UnboundedReceiverStream::new(rx),
        tasks,
    }
}

/// Build a branch that waits `delay`, then subscribes to the stream
/// produced by `start`. `start` is not called before the delay elapses.
pub fn deferred<T, F>(delay: Duration, start: F) -> BoxStream<'static, T>
where
    T: Send + 'static,
    F: FnOnce() -> BoxStream<'static, T> + Send + 'static,
{
    stream::once(async move {
        tokio::time::sleep(delay).await;
        start()
    })
    .flatten()
    .boxed()
}

/// Output of [`merge_delay_error`].
pub struct MergedStream<T> {
    items: UnboundedReceiverStream<T>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T> MergedStream<T> {
    /// Number of branches that have not finished yet.
    pub fn pending_branches(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl<T> Stream for MergedStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.items).poll_next(cx)
    }
}

impl<T> Drop for MergedStream<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

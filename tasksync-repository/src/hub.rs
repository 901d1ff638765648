//! Replay-last multicast of published values.
//!
//! Every subscriber receives the most recent value on subscription, then
//! every later value in publish order. Each subscriber has its own unbounded
//! queue, so a slow consumer never causes another to miss a value.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

struct HubState<T> {
    last: Option<T>,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

/// Multicast point with replay of the last value.
pub struct BroadcastHub<T> {
    state: Arc<Mutex<HubState<T>>>,
}

impl<T> Clone for BroadcastHub<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for BroadcastHub<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                last: None,
                subscribers: Vec::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for BroadcastHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BroadcastHub")
            .field("has_last", &state.last.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl<T> BroadcastHub<T> {
    fn lock(&self) -> MutexGuard<'_, HubState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> BroadcastHub<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the latest and deliver it to every live subscriber.
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn publish(&self, value: T) -> usize {
        let mut state = self.lock();
        state
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        state.last = Some(value);
        let receivers = state.subscribers.len();
        debug!(receivers, "Published to hub");
        receivers
    }

    /// Attach a new subscriber. It first receives the latest value, if any.
    ///
    /// Replay and registration happen under one lock, so no publish can slip
    /// between them and nothing is delivered twice.
    pub fn subscribe(&self) -> HubSubscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let Some(last) = &state.last {
            // The receiver is still held here, so this send cannot fail.
            let _ = tx.send(last.clone());
        }
        state.subscribers.push(tx);
        HubSubscription {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Run `on_value` for every value this subscription observes.
    ///
    /// Aborting the returned handle detaches the subscriber.
    pub fn subscribe_with<F>(&self, mut on_value: F) -> JoinHandle<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(value) = subscription.next().await {
                on_value(value);
            }
        })
    }

    /// Most recently published value.
    pub fn last(&self) -> Option<T> {
        self.lock().last.clone()
    }

    /// Number of live subscribers. Dropped subscriptions are pruned first.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

/// One subscriber's view of a [`BroadcastHub`].
///
/// Ends only when the hub itself is dropped. Dropping the subscription
/// detaches it.
pub struct HubSubscription<T> {
    inner: UnboundedReceiverStream<T>,
}

impl<T> HubSubscription<T> {
    /// Wait for the next value.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.as_mut().recv().await
    }

    /// Take the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.inner.as_mut().try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl<T> Stream for HubSubscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> fmt::Debug for HubSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubSubscription").finish_non_exhaustive()
    }
}

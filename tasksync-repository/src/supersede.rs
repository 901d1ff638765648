//! Latest-wins slots for operations that may be restarted.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Default)]
struct SlotState {
    generation: u64,
    running: Option<AbortHandle>,
}

/// Tracks the in-flight instance of one kind of operation.
///
/// Starting an instance bumps the generation and cancels the previous one.
/// Work tagged with an older generation is refused by [`run_if_current`],
/// which holds the slot lock while it runs, so a stale instance can never
/// publish after its successor has started.
///
/// [`run_if_current`]: OperationSlot::run_if_current
pub(crate) struct OperationSlot {
    name: &'static str,
    state: Mutex<SlotState>,
}

impl OperationSlot {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SlotState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new instance and cancel the previous one.
    pub(crate) fn begin(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(previous) = state.running.take() {
            if !previous.is_finished() {
                debug!(operation = self.name, "Superseding in-flight operation");
            }
            previous.abort();
        }
        state.generation
    }

    /// Register the task running `generation`. A task that was already
    /// superseded is cancelled at once.
    pub(crate) fn attach(&self, generation: u64, handle: AbortHandle) {
        let mut state = self.lock();
        if state.generation == generation {
            state.running = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Run `f` only if `generation` is still the latest.
    pub(crate) fn run_if_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let state = self.lock();
        (state.generation == generation).then(f)
    }
}

//! # Sync Scheduler
//!
//! A single-shot, cancellable delayed task used to debounce pushes.
//!
//! Every [`DebouncedTask::schedule`] call cancels the previously armed,
//! not-yet-fired action and arms a new one, so a burst of calls runs only
//! the last action once the quiet period has elapsed.
//!
//! Cancellation only reaches the timer. Once the delay has elapsed the
//! action runs as its own task and is never aborted, so an in-flight push
//! always completes.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Cancel-and-rearm delayed task
#[derive(Debug)]
pub struct DebouncedTask {
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timer: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` after the delay, replacing any action still waiting
    ///
    /// Must be called from within a Tokio runtime; outside one the action is
    /// dropped with a warning.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available; scheduled action dropped");
            return;
        };

        let delay = self.delay;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action);
        });

        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drop the waiting action, if any
    pub fn cancel(&self) {
        if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
        }
    }

    /// Whether an action is waiting for its delay to elapse
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DebouncedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

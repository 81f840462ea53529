//! Scoped follow-up timers
//!
//! Presentation follow-ups (delayed reveals, celebration sequences) are
//! spawned into a [`TimerScope`] owned by the hosting view. Tearing the view
//! down aborts them. Submissions are never spawned here.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owner of spawned follow-up tasks
#[derive(Debug, Default)]
pub struct TimerScope {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerScope {
    /// Empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` after `delay` unless the scope is cancelled first
    ///
    /// Must be called inside a Tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Timers not yet fired
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort every pending timer
    pub fn cancel_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        if !handles.is_empty() {
            tracing::debug!(count = handles.len(), "cancelling presentation timers");
        }
        for handle in handles {
            handle.abort();
        }
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

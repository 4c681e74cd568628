//! Tokio-backed timer

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Timer, TimerHandle, TimerTask, lock};
use crate::error::{Result, SchedulerError};

/// Timer that spawns one sleeping tokio task per scheduled callback
///
/// Cancelling aborts the sleeping task. Dropping the timer aborts every
/// task that has not fired yet.
pub struct TokioTimer {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioTimer {
    /// Create a timer bound to the runtime of the calling thread
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::with_handle(runtime))
    }

    /// Create a timer bound to an explicit runtime handle
    pub fn with_handle(runtime: Handle) -> Self {
        debug!("TokioTimer::with_handle: called");
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of callbacks that have not fired or been cancelled
    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, ?delay, "TokioTimer::schedule: called");

        let tasks = Arc::clone(&self.tasks);
        // Held across the spawn so the task cannot look itself up before it is registered
        let mut guard = lock(&self.tasks);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let registered = lock(&tasks).remove(&id);
            if registered.is_some() {
                debug!(id, "TokioTimer: firing");
                task();
            } else {
                debug!(id, "TokioTimer: cancelled before firing");
            }
        });
        guard.insert(id, join);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: &TimerHandle) {
        debug!(id = handle.id(), "TokioTimer::cancel: called");
        if let Some(join) = lock(&self.tasks).remove(&handle.id()) {
            join.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, join) in lock(&self.tasks).drain() {
            join.abort();
        }
    }
}

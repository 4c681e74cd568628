//! Timer capability used by the scheduler to pace its ticks
//!
//! The scheduler never sleeps itself. It asks a [`Timer`] to run a task
//! after a delay and keeps the returned [`TimerHandle`] so it can cancel
//! the task on pause or clear. Two implementations ship with the crate:
//!
//! - [`TokioTimer`] - real time, backed by `tokio::time::sleep`
//! - [`ManualTimer`] - a simulated clock advanced explicitly by tests

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

mod manual;
mod runtime;

pub use manual::ManualTimer;
pub use runtime::TokioTimer;

/// A deferred unit of work handed to a [`Timer`]
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle for a scheduled timer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Create a handle from an implementation-defined id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Implementation-defined id of this handle
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host timer facility
///
/// Implementations must never run `task` inline from `schedule`, even for
/// a zero delay. Cancelling a handle whose task already ran (or is running)
/// is a no-op.
pub trait Timer: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;

    /// Cancel a task scheduled earlier, if it has not fired yet
    fn cancel(&self, handle: &TimerHandle);
}

/// Lock a std mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

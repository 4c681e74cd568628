//! Simulated clock for deterministic scheduling tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use super::{Timer, TimerHandle, TimerTask, lock};

struct ManualInner {
    now: Duration,
    next_id: u64,
    /// Keyed by (due time, id) so ties fire in scheduling order
    entries: BTreeMap<(Duration, u64), TimerTask>,
}

/// Timer driven by explicit calls to [`ManualTimer::advance`]
///
/// Nothing fires on its own. Tasks run on the thread that advances the
/// clock, outside the timer's lock, so they may schedule or cancel
/// further tasks.
pub struct ManualTimer {
    inner: Mutex<ManualInner>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualInner {
                now: Duration::ZERO,
                next_id: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Current simulated time since creation
    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    /// Number of scheduled tasks that have not fired
    pub fn pending(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// Due time of the earliest scheduled task
    pub fn next_due(&self) -> Option<Duration> {
        lock(&self.inner).entries.keys().next().map(|(due, _)| *due)
    }

    /// Move the clock forward by `by`, running every task that falls due
    ///
    /// Tasks scheduled while advancing run too if they fall inside the
    /// window. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.inner).now + by;
        debug!(?by, ?target, "ManualTimer::advance: called");
        let mut ran = 0;
        while let Some(task) = self.pop_due(Some(target)) {
            task();
            ran += 1;
        }
        lock(&self.inner).now = target;
        ran
    }

    /// Run tasks in due order until none remain, jumping the clock as needed
    ///
    /// Returns the number of tasks run. A task chain that reschedules
    /// itself forever will not return.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(None) {
            task();
            ran += 1;
        }
        ran
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<TimerTask> {
        let mut inner = lock(&self.inner);
        let key = *inner.entries.keys().next()?;
        if limit.is_some_and(|limit| key.0 > limit) {
            return None;
        }
        inner.now = inner.now.max(key.0);
        inner.entries.remove(&key)
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        let due = inner.now + delay;
        debug!(id, ?due, "ManualTimer::schedule: called");
        inner.entries.insert((due, id), task);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: &TimerHandle) {
        debug!(id = handle.id(), "ManualTimer::cancel: called");
        lock(&self.inner).entries.retain(|(_, id), _| *id != handle.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &'static str| -> TimerTask {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_advance_runs_due_tasks_in_order() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        timer.schedule(Duration::from_millis(30), task("c"));
        timer.schedule(Duration::from_millis(10), task("a"));
        timer.schedule(Duration::from_millis(10), task("b"));

        assert_eq!(timer.advance(Duration::from_millis(20)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(timer.now(), Duration::from_millis(20));
        assert_eq!(timer.pending(), 1);
        assert_eq!(timer.next_due(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_cancel_removes_task() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        let handle = timer.schedule(Duration::ZERO, task("x"));
        timer.cancel(&handle);

        assert_eq!(timer.advance(Duration::from_secs(1)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_tasks_scheduled_during_advance_run_within_window() {
        let timer = Arc::new(ManualTimer::new());
        let (log, task) = recorder();

        let inner_timer = Arc::clone(&timer);
        let follow_up = task("second");
        let first = task("first");
        timer.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                first();
                inner_timer.schedule(Duration::from_millis(5), follow_up);
            }),
        );

        timer.advance(Duration::from_millis(10));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_run_until_idle_jumps_clock() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        timer.schedule(Duration::from_secs(60), task("late"));
        assert_eq!(timer.run_until_idle(), 1);
        assert_eq!(timer.now(), Duration::from_secs(60));
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }
}

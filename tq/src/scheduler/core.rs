//! Scheduler implementation

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::timer::{Timer, TimerHandle, TokioTimer};

use super::completion::{Completion, Processor};
use super::config::{Concurrency, SchedulerConfig};
use super::queue::{QueueState, SchedulerStats};

/// Callback fired when a non-persistent scheduler drains its buffer
pub type OnComplete = Arc<dyn Fn() + Send + Sync + 'static>;

/// Internal state protected by mutex
struct SchedulerInner<T> {
    /// Pending items, head first
    items: VecDeque<T>,

    paused: bool,

    /// Processor invocations dispatched and not yet completed
    active: usize,

    /// The one armed tick, if any
    tick: Option<ArmedTick>,

    /// Sequence number handed to the next armed tick
    next_tick_seq: u64,

    /// The current drain episode is over (completion fired or buffer cleared)
    drained: bool,

    stats: SchedulerStats,
}

/// A tick handed to the timer, tagged so a late firing can tell it is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedTick {
    handle: TimerHandle,
    seq: u64,
}

struct Shared<T> {
    config: SchedulerConfig,
    concurrency: Concurrency,
    processor: Processor<T>,
    on_complete: Option<OnComplete>,
    timer: Arc<dyn Timer>,
    inner: Mutex<SchedulerInner<T>>,
}

/// Paced single-queue scheduler
///
/// Items are buffered in order and handed to the [`Processor`] one per
/// tick, with `delay` between ticks. In unbounded mode ticks are purely
/// timer-driven; in bounded mode the next tick is armed when an in-flight
/// invocation completes. At most one tick is armed at any time.
///
/// `Scheduler` is a cheap handle: clones share one queue. Timer callbacks
/// and completions hold only weak references, so dropping the last handle
/// cancels the armed tick and turns late completions into no-ops. A
/// processor that captures its own scheduler keeps it alive until
/// something breaks that cycle.
pub struct Scheduler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> {
    /// Start building a scheduler
    pub fn builder() -> SchedulerBuilder<T> {
        SchedulerBuilder::new()
    }

    /// Create a scheduler on the tokio timer of the current runtime
    pub fn new(processor: Processor<T>, config: SchedulerConfig) -> Result<Self> {
        Self::builder().processor(processor).config(config).build()
    }

    /// Number of buffered items, excluding ones already dispatched
    pub fn size(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// Processor invocations dispatched and not yet completed
    pub fn active_count(&self) -> usize {
        self.shared.lock().active
    }

    pub fn is_tick_pending(&self) -> bool {
        self.shared.lock().tick.is_some()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn concurrency(&self) -> Concurrency {
        self.shared.concurrency
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats.clone()
    }

    /// Get a point-in-time view of the queue
    pub fn state(&self) -> QueueState {
        let inner = self.shared.lock();
        QueueState {
            queued: inner.items.len(),
            active: inner.active,
            paused: inner.paused,
            tick_pending: inner.tick.is_some(),
            stats: inner.stats.clone(),
        }
    }

    /// Append one item; returns the new size
    pub fn enqueue_tail(&self, item: T) -> usize {
        debug!("Scheduler::enqueue_tail: called");
        self.enqueue_with(|items| items.push_back(item))
    }

    /// Prepend one item; returns the new size
    pub fn enqueue_head(&self, item: T) -> usize {
        debug!("Scheduler::enqueue_head: called");
        self.enqueue_with(|items| items.push_front(item))
    }

    /// Append a sequence of items in order; returns the new size
    pub fn enqueue_tail_all<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        debug!("Scheduler::enqueue_tail_all: called");
        // Collected before locking so the caller's iterator never runs under the lock
        let incoming: Vec<T> = items.into_iter().collect();
        self.enqueue_with(|buffer| buffer.extend(incoming))
    }

    /// Prepend a sequence of items, keeping their relative order
    ///
    /// `[a, b, c]` inserted ahead of `[x]` yields `[a, b, c, x]`.
    pub fn enqueue_head_all<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        debug!("Scheduler::enqueue_head_all: called");
        let incoming: Vec<T> = items.into_iter().collect();
        self.enqueue_with(|buffer| {
            for item in incoming.into_iter().rev() {
                buffer.push_front(item);
            }
        })
    }

    /// Disarm scheduling and hand back every buffered item in order
    ///
    /// In-flight invocations are not cancelled. Clearing also ends the
    /// current drain episode, so no completion callback fires for it.
    pub fn clear(&self) -> Vec<T> {
        let mut inner = self.shared.lock();
        self.shared.disarm(&mut inner);
        let removed: Vec<T> = inner.items.drain(..).collect();
        inner.drained = true;
        inner.stats.total_cleared += removed.len() as u64;
        debug!(removed = removed.len(), "Scheduler::clear: called");
        removed
    }

    /// Stop dispatching; in-flight invocations run to completion
    pub fn pause(&self) {
        debug!("Scheduler::pause: called");
        let mut inner = self.shared.lock();
        self.shared.disarm(&mut inner);
        inner.paused = true;
    }

    /// Resume dispatching
    ///
    /// If items are buffered and no tick is armed, the first dispatch
    /// happens without waiting for `delay`.
    pub fn resume(&self) {
        debug!("Scheduler::resume: called");
        let mut inner = self.shared.lock();
        inner.paused = false;
        self.shared.arm(&mut inner);
    }

    /// Alias for [`Scheduler::resume`]
    pub fn start(&self) {
        self.resume();
    }

    fn enqueue_with(&self, insert: impl FnOnce(&mut VecDeque<T>)) -> usize {
        let mut inner = self.shared.lock();
        let before = inner.items.len();
        insert(&mut inner.items);
        let size = inner.items.len();
        let added = size - before;

        if added > 0 {
            inner.drained = false;
            inner.stats.total_enqueued += added as u64;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(size);
        }

        if inner.paused {
            debug!(added, size, "Scheduler::enqueue: paused, not arming");
        } else {
            self.shared.arm(&mut inner);
        }
        size
    }
}

impl<T: PartialEq + Send + 'static> Scheduler<T> {
    /// Index of the first buffered item equal to `item`
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.shared.lock().items.iter().position(|queued| queued == item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Scheduler")
            .field("queued", &inner.items.len())
            .field("active", &inner.active)
            .field("paused", &inner.paused)
            .field("tick_pending", &inner.tick.is_some())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, SchedulerInner<T>> {
        crate::timer::lock(&self.inner)
    }

    fn disarm(&self, inner: &mut SchedulerInner<T>) {
        if let Some(armed) = inner.tick.take() {
            debug!(id = armed.handle.id(), "Scheduler: cancelling armed tick");
            self.timer.cancel(&armed.handle);
        }
    }
}

impl<T: Send + 'static> Shared<T> {
    /// Arm an immediate tick if there is work and nothing is armed yet
    fn arm(self: &Arc<Self>, inner: &mut SchedulerInner<T>) {
        if !inner.items.is_empty() && inner.tick.is_none() {
            self.schedule_tick(inner, Duration::ZERO);
        }
    }

    fn schedule_tick(self: &Arc<Self>, inner: &mut SchedulerInner<T>, delay: Duration) {
        self.disarm(inner);
        let seq = inner.next_tick_seq;
        inner.next_tick_seq += 1;
        let weak = Arc::downgrade(self);
        let handle = self.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.tick(seq);
                }
            }),
        );
        debug!(id = handle.id(), seq, ?delay, "Scheduler: tick armed");
        inner.tick = Some(ArmedTick { handle, seq });
    }

    /// One evaluation of the scheduling loop
    ///
    /// A tick that fired after being cancelled, or after another tick was
    /// armed in its place, is stale and does nothing.
    fn tick(self: &Arc<Self>, seq: u64) {
        let mut inner = self.lock();
        if inner.tick.map(|armed| armed.seq) != Some(seq) {
            debug!(seq, "Scheduler::tick: stale tick, ignoring");
            return;
        }
        inner.tick = None;

        if inner.paused {
            debug!("Scheduler::tick: paused, stopping");
            return;
        }

        if let Concurrency::Bounded(cap) = self.concurrency {
            if inner.active >= cap.get() {
                debug!(
                    active = inner.active,
                    cap = cap.get(),
                    "Scheduler::tick: at capacity, waiting for a completion"
                );
                return;
            }
        }

        let Some(item) = inner.items.pop_front() else {
            if self.config.persistent {
                debug!("Scheduler::tick: empty and persistent, idling");
                return;
            }
            if inner.drained {
                debug!("Scheduler::tick: empty, drain already signalled");
                return;
            }
            inner.drained = true;
            inner.stats.drain_count += 1;
            drop(inner);

            info!("Scheduler: queue drained");
            if let Some(on_complete) = &self.on_complete {
                on_complete();
            }
            return;
        };

        inner.active += 1;
        inner.stats.total_dispatched += 1;
        inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.active);
        debug!(
            active = inner.active,
            remaining = inner.items.len(),
            "Scheduler::tick: dispatching"
        );

        if !self.concurrency.is_bounded() {
            self.schedule_tick(&mut inner, self.config.delay());
        }
        drop(inner);

        let done = self.completion();
        self.processor.call(item, done);
    }

    fn completion(self: &Arc<Self>) -> Completion {
        let weak = Arc::downgrade(self);
        Completion::new(move || match weak.upgrade() {
            Some(shared) => shared.finish(),
            None => debug!("Scheduler: completion after scheduler dropped, ignoring"),
        })
    }

    /// Release a slot and, in bounded mode, arm the next tick
    fn finish(self: &Arc<Self>) {
        let mut inner = self.lock();
        inner.active = inner.active.saturating_sub(1);
        inner.stats.total_completed += 1;
        debug!(active = inner.active, "Scheduler::finish: invocation completed");

        if !self.concurrency.is_bounded() {
            return;
        }
        if inner.paused {
            debug!("Scheduler::finish: paused, not arming");
            return;
        }
        if inner.tick.is_some() {
            debug!("Scheduler::finish: tick already armed");
            return;
        }
        self.schedule_tick(&mut inner, self.config.delay());
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(armed) = inner.tick.take() {
            self.timer.cancel(&armed.handle);
        }
    }
}

/// Builder for [`Scheduler`]
pub struct SchedulerBuilder<T> {
    processor: Option<Processor<T>>,
    config: SchedulerConfig,
    on_complete: Option<OnComplete>,
    timer: Option<Arc<dyn Timer>>,
}

impl<T: Send + 'static> SchedulerBuilder<T> {
    pub fn new() -> Self {
        Self {
            processor: None,
            config: SchedulerConfig::default(),
            on_complete: None,
            timer: None,
        }
    }

    pub fn processor(mut self, processor: Processor<T>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    /// Cap in-flight invocations; -1 removes the cap
    pub fn max_concurrent(mut self, max_concurrent: i64) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    pub fn start_paused(mut self, start_paused: bool) -> Self {
        self.config.start_paused = start_paused;
        self
    }

    /// Callback run once each time a non-persistent queue drains
    ///
    /// `clear()` ends the current drain without firing it, and invocations
    /// still in flight at the clear do not fire it when they finish either.
    /// The next enqueue starts a fresh drain.
    pub fn on_complete<F>(mut self, on_complete: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(on_complete));
        self
    }

    /// Use a specific timer instead of the tokio timer of the current runtime
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn build(self) -> Result<Scheduler<T>> {
        debug!(config = ?self.config, "SchedulerBuilder::build: called");
        let processor = self
            .processor
            .ok_or_else(|| SchedulerError::InvalidArgument("a processor is required".to_string()))?;
        let concurrency = self.config.concurrency()?;
        let timer: Arc<dyn Timer> = match self.timer {
            Some(timer) => timer,
            None => Arc::new(TokioTimer::new()?),
        };

        let paused = self.config.start_paused;
        Ok(Scheduler {
            shared: Arc::new(Shared {
                config: self.config,
                concurrency,
                processor,
                on_complete: self.on_complete,
                timer,
                inner: Mutex::new(SchedulerInner {
                    items: VecDeque::new(),
                    paused,
                    active: 0,
                    tick: None,
                    next_tick_seq: 0,
                    drained: false,
                    stats: SchedulerStats::default(),
                }),
            }),
        })
    }
}

impl<T: Send + 'static> Default for SchedulerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

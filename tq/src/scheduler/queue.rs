//! Snapshot types for the scheduler

/// Counters accumulated over the scheduler's lifetime
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_enqueued: u64,
    pub total_dispatched: u64,
    pub total_completed: u64,
    pub total_cleared: u64,
    /// Non-persistent drains that fired the completion callback
    pub drain_count: u64,
    pub peak_queue_depth: usize,
    pub peak_concurrent: usize,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    /// Items buffered, not yet dispatched
    pub queued: usize,
    /// Processor invocations dispatched and not yet completed
    pub active: usize,
    pub paused: bool,
    /// A future tick is armed on the timer
    pub tick_pending: bool,
    pub stats: SchedulerStats,
}

impl QueueState {
    /// Nothing buffered, nothing in flight, nothing armed
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.active == 0 && !self.tick_pending
    }
}

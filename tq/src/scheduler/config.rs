//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Value of `max_concurrent` meaning "no cap"
pub const UNBOUNDED: i64 = -1;

/// Scheduler configuration
///
/// Unknown keys are ignored and omitted keys take their defaults, so a
/// partial YAML mapping is always a valid configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between the end of one dispatch and the next, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Stay armed when the buffer empties instead of signalling completion
    #[serde(default)]
    pub persistent: bool,

    /// Cap on in-flight processor invocations; -1 for no cap
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: i64,

    /// Start paused; nothing dispatches until resume
    #[serde(default)]
    pub start_paused: bool,
}

fn default_delay_ms() -> u64 {
    100
}

fn default_max_concurrent() -> i64 {
    UNBOUNDED
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            persistent: false,
            max_concurrent: default_max_concurrent(),
            start_paused: false,
        }
    }
}

impl SchedulerConfig {
    /// Get the inter-dispatch delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Interpret `max_concurrent`
    ///
    /// `-1` is unbounded, any positive value is a cap. Zero and values
    /// below `-1` are rejected.
    pub fn concurrency(&self) -> Result<Concurrency> {
        match self.max_concurrent {
            UNBOUNDED => Ok(Concurrency::Unbounded),
            n if n > 0 => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Concurrency::Bounded)
                .ok_or_else(|| SchedulerError::InvalidArgument(format!("max_concurrent out of range: {}", n))),
            n => Err(SchedulerError::InvalidArgument(format!(
                "max_concurrent must be -1 or positive, got {}",
                n
            ))),
        }
    }
}

/// How many processor invocations may be outstanding at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Dispatch purely on the timer, whatever is still in flight
    Unbounded,

    /// At most this many outstanding invocations; completions drive the loop
    Bounded(NonZeroUsize),
}

impl Concurrency {
    pub fn is_bounded(&self) -> bool {
        matches!(self, Concurrency::Bounded(_))
    }
}

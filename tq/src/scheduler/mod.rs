//! Paced single-queue scheduler
//!
//! Buffers items in order and feeds them to a processor one tick at a
//! time, with a delay between ticks, pause/resume control and an optional
//! cap on in-flight invocations.

mod completion;
mod config;
mod core;
mod queue;

pub use completion::{Completion, Processor};
pub use config::{Concurrency, SchedulerConfig, UNBOUNDED};
pub use core::{OnComplete, Scheduler, SchedulerBuilder};
pub use queue::{QueueState, SchedulerStats};

//! TaskQueue - paced single-queue task scheduler
//!
//! An ordered in-memory buffer of work items, drained one tick at a time
//! by a caller-supplied processor. Ticks are spaced by a configurable
//! delay, can be paused and resumed, and may be capped to a number of
//! in-flight invocations.
//!
//! # Core Concepts
//!
//! - **Ticks**: one item is dispatched per tick; at most one tick is armed
//! - **Unbounded mode**: ticks follow the timer, whatever is still running
//! - **Bounded mode**: a completion arms the next tick, capping in-flight work
//! - **Persistence**: a persistent queue idles when empty; otherwise it
//!   fires its completion callback once per drain
//! - **Injected time**: the [`timer::Timer`] capability makes the loop
//!   testable against a simulated clock
//!
//! # Example
//!
//! ```ignore
//! use taskqueue::{Processor, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(
//!     Processor::sync(|job: String| println!("processing {}", job)),
//!     SchedulerConfig::default(),
//! )?;
//! scheduler.enqueue_tail_all(["a".to_string(), "b".to_string()]);
//! ```
//!
//! # Modules
//!
//! - [`scheduler`] - the queue, its processor contract and configuration
//! - [`timer`] - timer capability with tokio and manual implementations
//! - [`config`] - file-based configuration for the `tq` binary
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod timer;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SchedulerError};
pub use scheduler::{
    Completion, Concurrency, OnComplete, Processor, QueueState, Scheduler, SchedulerBuilder, SchedulerConfig,
    SchedulerStats,
};
pub use timer::{ManualTimer, Timer, TimerHandle, TimerTask, TokioTimer};

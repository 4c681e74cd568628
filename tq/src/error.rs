//! Error types for the task queue

use thiserror::Error;

/// Errors raised by the scheduler and its configuration layer
///
/// Processor failures never show up here: the scheduler only observes
/// whether an invocation has completed, not how it went.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No tokio runtime available on this thread")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

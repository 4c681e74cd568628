//! Processor and completion-signal types

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::error::{Result, SchedulerError};

/// One-shot signal that a processor invocation has finished
///
/// Call [`Completion::done`] when the work for an item is over, whether it
/// succeeded or not. Dropping an unresolved completion resolves it, so a
/// processor that panics or forgets to signal still releases its slot.
pub struct Completion {
    on_done: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Completion {
    /// Create a completion that runs `on_done` when resolved
    pub fn new(on_done: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_done: Some(Box::new(on_done)),
        }
    }

    /// Resolve the signal
    pub fn done(mut self) {
        self.resolve();
    }

    fn resolve(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.resolve();
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.on_done.is_some())
            .finish()
    }
}

/// Caller-supplied work function, invoked once per dispatched item
///
/// The scheduler hands each item over together with a [`Completion`]
/// and awaits nothing but that signal.
pub struct Processor<T> {
    inner: Arc<dyn Fn(T, Completion) + Send + Sync + 'static>,
}

impl<T: Send + 'static> Processor<T> {
    /// Processor that resolves the completion itself, possibly later
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T, Completion) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Processor whose work is over when the call returns
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new(move |item, done| {
            f(item);
            done.done();
        })
    }

    /// Processor that spawns a future per item on the current tokio runtime
    ///
    /// The invocation completes when the future finishes (or panics).
    pub fn from_async<F, Fut>(f: F) -> Result<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::new(move |item, done| {
            let work = f(item);
            runtime.spawn(async move {
                work.await;
                done.done();
            });
        }))
    }

    pub(crate) fn call(&self, item: T, done: Completion) {
        (self.inner)(item, done)
    }
}

impl<T> Clone for Processor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Processor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Processor")
    }
}

//! [`Executor`] implementations that can be passed to [`super::AsyncResult::on_completion_with`].
use std::thread;

use tokio::runtime::Handle;
use tracing::{event, Level};

use super::{Callback, Executor};

/// Runs callbacks right away, on the thread that hands them over
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, task: Callback) {
        task()
    }
}

/// Runs every callback on a freshly spawned OS thread
#[derive(Clone, Debug, Default)]
pub struct ThreadExecutor {
    name: Option<String>,
}

impl ThreadExecutor {
    /// Threads spawned by this executor will be named `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Callback) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }

        if let Err(err) = builder.spawn(task) {
            // the callback was moved into the failed spawn, there is nothing left to run
            event!(Level::ERROR, "unable to spawn callback thread: {}", err);
        }
    }
}

/// Hands every callback to the blocking pool of a tokio runtime.
///
/// Callbacks are plain closures that may block (eg: call `get` on another result),
/// so they are never run on the async worker threads.
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Builds a [`TokioExecutor`] for the runtime the caller is running on.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime (see [`Handle::current`])
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Callback) {
        drop(self.handle.spawn_blocking(task));
    }
}

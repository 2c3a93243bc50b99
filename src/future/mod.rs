//! Module that contains the asynchronous result primitives.
//!
//! An [`AsyncResult`] is the read side of a value that is produced exactly once, somewhere else.
//! Observers can either block on [`AsyncResult::get`] or register a callback with [`AsyncResult::on_completion`].
//! The write side lives in [`settable::SettableResult`], which is handed to a single producer.
//! [`merging::MergingResult`] aggregates N results into one through a [`crate::merge::Merger`].
//! [`countdown::CountDownResult`] completes once a fixed number of acknowledgements arrived.
use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;
use tracing::{event, Level};

use crate::error::{Error, Result};

mod completion;
pub mod countdown;
pub mod executor;
pub mod merging;
pub mod settable;

/// A zero-argument callback invoked once a result reaches its terminal state.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque "run this callback somewhere" capability supplied by the embedding system.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Callback);
}

/// Read side of a value produced asynchronously, at most once.
///
/// The terminal states are: succeeded (with a value), failed (with an [`Error`]) or cancelled.
/// Once a result reaches one of them, it never transitions again.
pub trait AsyncResult<V>: Send + Sync {
    /// Blocks until this result is terminal.
    ///
    /// # Error
    /// Returns [`Error::Cancelled`] if the result was cancelled or the error set by the producer if it failed.
    fn get(&self) -> Result<V>;

    /// Same as [`AsyncResult::get`], but gives up after `timeout` with [`Error::Timeout`].
    /// A timeout does not change the state of the result.
    fn get_timeout(&self, timeout: Duration) -> Result<V>;

    /// Moves a pending result to the cancelled state. Returns false if it was already terminal.
    fn cancel(&self) -> bool;

    fn is_done(&self) -> bool;

    fn is_cancelled(&self) -> bool;

    /// If this result is still pending, the callback runs in the thread that completes it.
    /// Otherwise it runs in the caller's thread before this function returns.
    fn on_completion(&self, callback: Callback);

    /// The callback is handed to `executor` once this result is terminal.
    fn on_completion_with(&self, callback: Callback, executor: Arc<dyn Executor>);
}

/// Awaits `result` from async code without blocking the runtime.
///
/// A completion callback notifies a [`oneshot`] channel. By the time the channel fires,
/// `result` is terminal and [`AsyncResult::get`] returns without blocking.
pub async fn wait<V, R>(result: &R) -> Result<V>
where
    R: AsyncResult<V> + ?Sized,
{
    let (sender, receiver) = oneshot::channel();
    result.on_completion(Box::new(move || {
        let _ = sender.send(());
    }));

    if receiver.await.is_err() {
        // the callback was dropped without running, which only happens if the result is being torn down
        event!(Level::WARN, "completion callback dropped before delivery");
        return Err(Error::Cancelled);
    }

    result.get()
}

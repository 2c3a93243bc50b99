//! Terminal-state machine shared by every [`super::AsyncResult`] implementation in this crate.
//!
//! A [`Completion`] is a mutex protected cell plus a queue of callbacks. A terminal transition is a
//! critical section that:
//!  1. checks if the cell is already terminal (and bails out if so)
//!  2. applies the new state
//!  3. flips the `drained` flag and takes the queued callbacks
//!
//! The callbacks are then invoked, in registration order, OUTSIDE of the lock (callbacks are allowed to call
//! `get` on the result that triggered them). Only after all of them were delivered are blocked waiters released.
//!
//! A registration racing with a terminal transition either observes `drained == false` and gets queued before the
//! queue is taken, or observes `drained == true` and runs immediately. No callback is lost and none runs twice.
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{event, Level};

use super::{Callback, Executor};
use crate::error::{Error, Result};

/// Observable state of a result
#[derive(Debug)]
pub(crate) enum State<V> {
    Pending,
    Succeeded(V),
    Failed(Error),
    Cancelled,
}

impl<V: Clone> State<V> {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    /// Returns None while pending
    fn outcome(&self) -> Option<Result<V>> {
        match self {
            State::Pending => None,
            State::Succeeded(value) => Some(Ok(value.clone())),
            State::Failed(err) => Some(Err(err.clone())),
            State::Cancelled => Some(Err(Error::Cancelled)),
        }
    }
}

/// A queued callback, optionally bound to an [`Executor`]
pub(crate) struct Task {
    callback: Callback,
    executor: Option<Arc<dyn Executor>>,
}

impl Task {
    pub(crate) fn inline(callback: Callback) -> Self {
        Self {
            callback,
            executor: None,
        }
    }

    pub(crate) fn with_executor(callback: Callback, executor: Arc<dyn Executor>) -> Self {
        Self {
            callback,
            executor: Some(executor),
        }
    }

    fn execute(self) {
        match self.executor {
            Some(executor) => executor.execute(self.callback),
            None => (self.callback)(),
        }
    }
}

/// Callbacks taken out of the queue by a terminal transition. Must be handed back to [`Completion::deliver`].
#[must_use]
pub(crate) struct Drained(VecDeque<Task>);

/// Everything protected by the [`Completion`] mutex.
/// `extra` holds implementation specific bookkeeping that must be updated under the same lock
/// (eg: the accumulated values of a merge).
pub(crate) struct Inner<V, X> {
    pub(crate) state: State<V>,
    pub(crate) extra: X,
    tasks: VecDeque<Task>,
    drained: bool,
    notified: bool,
}

impl<V, X> Inner<V, X> {
    /// Applies `state` if this cell is still pending.
    /// Returns the callbacks that must now be delivered, or None if the cell was already terminal.
    pub(crate) fn transition(&mut self, state: State<V>) -> Option<Drained> {
        if !matches!(self.state, State::Pending) {
            return None;
        }

        self.state = state;
        self.drained = true;
        Some(Drained(std::mem::take(&mut self.tasks)))
    }
}

pub(crate) struct Completion<V, X = ()> {
    inner: Mutex<Inner<V, X>>,
    cond: Condvar,
}

impl<V, X> std::fmt::Debug for Completion<V, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Ok(inner) => f
                .debug_struct("Completion")
                .field("pending", &matches!(inner.state, State::Pending))
                .field("queued_callbacks", &inner.tasks.len())
                .field("notified", &inner.notified)
                .finish(),
            Err(_) => write!(f, "Unable to acquire lock for logging at this time..."),
        }
    }
}

impl<V, X> Completion<V, X> {
    /// State is only ever mutated after user code returned, so a poisoned lock still guards a consistent cell.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<V, X>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases every blocked waiter
    fn notify(&self) {
        self.lock().notified = true;
        self.cond.notify_all();
    }
}

/// Releases blocked waiters when dropped, including while unwinding out of [`Completion::deliver`]
struct NotifyOnDrop<'a, V, X>(&'a Completion<V, X>);

impl<V, X> Drop for NotifyOnDrop<'_, V, X> {
    fn drop(&mut self) {
        self.0.notify();
    }
}

impl<V: Clone, X> Completion<V, X> {
    pub(crate) fn new(extra: X) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Pending,
                extra,
                tasks: VecDeque::new(),
                drained: false,
                notified: false,
            }),
            cond: Condvar::new(),
        }
    }


    /// Tries to move this cell into `state`. Returns false if it was already terminal.
    pub(crate) fn complete(&self, state: State<V>) -> bool {
        let drained = self.lock().transition(state);
        match drained {
            Some(drained) => {
                self.deliver(drained);
                true
            }
            None => false,
        }
    }

    /// Invokes every drained callback in registration order, then releases blocked waiters.
    /// Must be called without holding the lock.
    ///
    /// A panicking callback does not prevent the next ones from running. Once every callback ran and the
    /// waiters were released, the first panic is resumed in the caller.
    pub(crate) fn deliver(&self, drained: Drained) {
        let notify = NotifyOnDrop(self);
        let Drained(tasks) = drained;
        event!(Level::TRACE, "delivering {} completion callbacks", tasks.len());

        let mut first_panic = None;
        for task in tasks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.execute())) {
                event!(Level::ERROR, "completion callback panicked");
                first_panic.get_or_insert(payload);
            }
        }

        drop(notify);
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    pub(crate) fn register(&self, task: Task) {
        let mut guard = self.lock();
        if guard.drained {
            drop(guard);
            task.execute();
            return;
        }

        event!(Level::TRACE, "queueing completion callback");
        guard.tasks.push_back(task);
    }

    pub(crate) fn is_done(&self) -> bool {
        !self.lock().state.is_pending()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.lock().state, State::Cancelled)
    }

    /// Blocks until terminal, or until `timeout` elapsed (if provided).
    ///
    /// If the cell is already terminal, returns right away. Otherwise waits until every queued callback
    /// was delivered. The remaining time is recomputed from a fixed deadline after every wakeup.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<V> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut guard = self.lock();
        let terminal_on_entry = !guard.state.is_pending();

        loop {
            if terminal_on_entry || guard.notified {
                if let Some(outcome) = guard.state.outcome() {
                    return outcome;
                }
            }

            guard = match (timeout, deadline) {
                (None, _) | (Some(_), None) => self
                    .cond
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                (Some(timeout), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return match guard.state.outcome() {
                            Some(outcome) => outcome,
                            None => Err(Error::Timeout { timeout }),
                        };
                    }
                    let (guard, _) = self
                        .cond
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
            };
        }
    }
}

//! [`CountDownResult`] waits for a fixed number of acknowledgements (eg: a write quorum) and then
//! succeeds with a value known upfront.
//!
//! Every [`CountDownResult::count_down`] brings it one step closer to completion. A single
//! [`CountDownResult::fail`] fails it right away, regardless of how many acknowledgements were still missing.
//! Observers cannot cancel it: only the producers that count down decide its outcome.
use std::{sync::Arc, time::Duration};

use tracing::{event, Level};

use super::{
    completion::{Completion, State, Task},
    AsyncResult, Callback, Executor,
};
use crate::error::{Error, Result};

/// Latch protected by the completion lock
struct Latch<V> {
    remaining: usize,
    /// handed over to the terminal state once `remaining` reaches 0
    value: Option<V>,
}

/// An [`AsyncResult`] completed by `count` calls to [`CountDownResult::count_down`]. Clones share the same latch.
pub struct CountDownResult<V> {
    completion: Arc<Completion<V, Latch<V>>>,
}

impl<V> Clone for CountDownResult<V> {
    fn clone(&self) -> Self {
        Self {
            completion: self.completion.clone(),
        }
    }
}

impl<V> std::fmt::Debug for CountDownResult<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownResult")
            .field("completion", &self.completion)
            .finish()
    }
}

impl<V: Clone + Send + 'static> CountDownResult<V> {
    /// Constructs a result that succeeds with `value` after `count` acknowledgements.
    /// With a `count` of 0 it is born succeeded.
    pub fn new(count: usize, value: V) -> Self {
        let completion = Arc::new(Completion::new(Latch {
            remaining: count,
            value: Some(value),
        }));

        if count == 0 {
            let drained = {
                let mut guard = completion.lock();
                match guard.extra.value.take() {
                    Some(value) => guard.transition(State::Succeeded(value)),
                    None => None,
                }
            };
            if let Some(drained) = drained {
                completion.deliver(drained);
            }
        }

        Self { completion }
    }

    /// Records one acknowledgement. Returns false if the result was already terminal.
    pub fn count_down(&self) -> bool {
        let drained = {
            let mut guard = self.completion.lock();
            if !guard.state.is_pending() {
                return false;
            }

            guard.extra.remaining -= 1;
            event!(
                Level::TRACE,
                "count down, {} acknowledgements remaining",
                guard.extra.remaining
            );
            if guard.extra.remaining > 0 {
                return true;
            }

            match guard.extra.value.take() {
                Some(value) => guard.transition(State::Succeeded(value)),
                None => None,
            }
        };

        if let Some(drained) = drained {
            event!(Level::DEBUG, "every acknowledgement received");
            self.completion.deliver(drained);
        }
        true
    }

    /// Fails the result immediately. Returns false if it was already terminal.
    pub fn fail(&self, err: Error) -> bool {
        event!(Level::DEBUG, "failing count down result with {}", err);
        self.completion.complete(State::Failed(err))
    }

    /// Number of acknowledgements still missing
    pub fn remaining(&self) -> usize {
        self.completion.lock().extra.remaining
    }
}

impl<V: Clone + Send + 'static> AsyncResult<V> for CountDownResult<V> {
    fn get(&self) -> Result<V> {
        self.completion.wait(None)
    }

    fn get_timeout(&self, timeout: Duration) -> Result<V> {
        self.completion.wait(Some(timeout))
    }

    /// Never cancellable
    fn cancel(&self) -> bool {
        false
    }

    fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    fn is_cancelled(&self) -> bool {
        false
    }

    fn on_completion(&self, callback: Callback) {
        self.completion.register(Task::inline(callback));
    }

    fn on_completion_with(&self, callback: Callback, executor: Arc<dyn Executor>) {
        self.completion
            .register(Task::with_executor(callback, executor));
    }
}

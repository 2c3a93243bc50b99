//! Producer/observer split of a single asynchronous result.
//!
//! [`SettableResult`] is the write side and is meant to be handed to exactly one producer.
//! [`ResultHandle`] is the read side and can be cloned and handed to any number of observers.
use std::{sync::Arc, time::Duration};

use tracing::{event, Level};

use super::{
    completion::{Completion, State, Task},
    AsyncResult, Callback, Executor,
};
use crate::error::{Error, Result};

/// Producer side of an [`AsyncResult`].
///
/// The first call among [`SettableResult::succeed`], [`SettableResult::fail`] and [`SettableResult::cancel`]
/// wins. Every later call is ignored and returns false.
#[derive(Debug)]
pub struct SettableResult<V> {
    completion: Arc<Completion<V>>,
}

/// Observer side of a [`SettableResult`]
#[derive(Debug)]
pub struct ResultHandle<V> {
    completion: Arc<Completion<V>>,
}

impl<V> Clone for ResultHandle<V> {
    fn clone(&self) -> Self {
        Self {
            completion: self.completion.clone(),
        }
    }
}

impl<V: Clone + Send + 'static> Default for SettableResult<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> SettableResult<V> {
    /// Constructs a new pending [`SettableResult`]
    pub fn new() -> Self {
        Self {
            completion: Arc::new(Completion::new(())),
        }
    }

    /// Constructs a [`SettableResult`] that already succeeded with `value`
    pub fn succeeded(value: V) -> Self {
        let result = Self::new();
        result.succeed(value);
        result
    }

    /// Constructs a [`SettableResult`] that already failed with `err`
    pub fn failed(err: Error) -> Self {
        let result = Self::new();
        result.fail(err);
        result
    }

    /// Returns a new observer handle for this result
    pub fn handle(&self) -> ResultHandle<V> {
        ResultHandle {
            completion: self.completion.clone(),
        }
    }

    /// Sets the outcome of this result and notifies every observer.
    /// Returns false if the result was already terminal.
    pub fn succeed(&self, value: V) -> bool {
        let applied = self.completion.complete(State::Succeeded(value));
        if applied {
            event!(Level::DEBUG, "result succeeded");
        }
        applied
    }

    /// Sets the outcome of this result and notifies every observer.
    /// Returns false if the result was already terminal.
    pub fn fail(&self, err: Error) -> bool {
        event!(Level::DEBUG, "failing result with {}", err);
        self.completion.complete(State::Failed(err))
    }

    pub fn cancel(&self) -> bool {
        self.completion.complete(State::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }
}

impl<V: Clone + Send + 'static> AsyncResult<V> for ResultHandle<V> {
    fn get(&self) -> Result<V> {
        self.completion.wait(None)
    }

    fn get_timeout(&self, timeout: Duration) -> Result<V> {
        self.completion.wait(Some(timeout))
    }

    fn cancel(&self) -> bool {
        self.completion.complete(State::Cancelled)
    }

    fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    fn on_completion(&self, callback: Callback) {
        self.completion.register(Task::inline(callback));
    }

    fn on_completion_with(&self, callback: Callback, executor: Arc<dyn Executor>) {
        self.completion
            .register(Task::with_executor(callback, executor));
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
        time::Duration,
    };

    use super::SettableResult;
    use crate::{error::Error, future::AsyncResult};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> Box<dyn FnOnce() + Send> {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_get_after_succeed() {
        let result = SettableResult::new();
        let handle = result.handle();
        assert!(!handle.is_done());
        assert!(result.succeed("value".to_string()));
        assert!(handle.is_done());
        assert!(!handle.is_cancelled());
        assert_eq!(handle.get().unwrap(), "value");
    }

    #[test]
    fn test_first_completion_wins() {
        let result = SettableResult::new();
        let handle = result.handle();
        let calls = Arc::new(AtomicUsize::new(0));
        handle.on_completion(counting_callback(&calls));

        assert!(result.fail(Error::Generic {
            reason: "replica down".to_string()
        }));
        assert!(!result.succeed(1));
        assert!(!result.cancel());
        assert!(!handle.cancel());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match handle.get() {
            Err(Error::Generic { reason }) => assert_eq!(reason, "replica down"),
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_cancel_is_distinguishable() {
        let result: SettableResult<u32> = SettableResult::new();
        let handle = result.handle();
        assert!(handle.cancel());
        assert!(handle.is_cancelled());
        assert!(handle.get().unwrap_err().is_cancelled());
        assert!(!result.succeed(3));
    }

    #[test]
    fn test_on_completion_after_terminal_runs_before_returning() {
        let result = SettableResult::succeeded(10u64);
        let calls = Arc::new(AtomicUsize::new(0));
        result.handle().on_completion(counting_callback(&calls));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_can_read_the_result() {
        let result = SettableResult::new();
        let handle = result.handle();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let observed = handle.clone();
        handle.on_completion(Box::new(move || {
            seen_clone.store(observed.get().unwrap(), Ordering::SeqCst);
        }));

        result.succeed(99usize);
        assert_eq!(seen.load(Ordering::SeqCst), 99);
    }

    #[test]
    fn test_get_timeout_leaves_result_pending() {
        let result: SettableResult<u8> = SettableResult::new();
        let handle = result.handle();
        let err = handle.get_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());
        assert!(!handle.is_done());

        // still usable afterwards
        result.succeed(5);
        assert_eq!(handle.get_timeout(Duration::from_millis(10)).unwrap(), 5);
    }

    #[test]
    fn test_blocked_waiter_is_released() {
        let result = SettableResult::new();
        let handle = result.handle();
        let waiter = thread::spawn(move || handle.get());

        thread::sleep(Duration::from_millis(20));
        result.succeed(vec![1u8, 2, 3]);
        assert_eq!(waiter.join().unwrap().unwrap(), vec![1u8, 2, 3]);
    }

    #[test]
    fn test_blocked_waiter_observes_callbacks_first() {
        let result = SettableResult::new();
        let handle = result.handle();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        handle.on_completion(Box::new(move || {
            thread::sleep(Duration::from_millis(20));
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let waiter_handle = handle.clone();
        let waiter_calls = calls.clone();
        let waiter = thread::spawn(move || {
            let value = waiter_handle.get().unwrap();
            (value, waiter_calls.load(Ordering::SeqCst))
        });

        thread::sleep(Duration::from_millis(50));
        result.succeed(1u32);
        assert_eq!(waiter.join().unwrap(), (1, 1));
    }

    #[test]
    fn test_concurrent_producers_single_winner() {
        for _ in 0..50 {
            let result = Arc::new(SettableResult::new());
            let handle = result.handle();
            let calls = Arc::new(AtomicUsize::new(0));
            handle.on_completion(counting_callback(&calls));

            let n_producers = 8;
            let barrier = Arc::new(Barrier::new(n_producers));
            let producers: Vec<_> = (0..n_producers)
                .map(|i| {
                    let result = result.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        result.succeed(i)
                    })
                })
                .collect();

            let winners = producers
                .into_iter()
                .map(|p| p.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(handle.get().is_ok());
        }
    }

    #[test]
    fn test_concurrent_registration_never_loses_callbacks() {
        for _ in 0..50 {
            let result = SettableResult::new();
            let handle = result.handle();
            let calls = Arc::new(AtomicUsize::new(0));
            let n_observers = 8;
            let barrier = Arc::new(Barrier::new(n_observers + 1));

            let observers: Vec<_> = (0..n_observers)
                .map(|_| {
                    let handle = handle.clone();
                    let barrier = barrier.clone();
                    let calls = calls.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        handle.on_completion(counting_callback(&calls));
                    })
                })
                .collect();

            barrier.wait();
            result.succeed(());
            for observer in observers {
                observer.join().unwrap();
            }

            assert_eq!(calls.load(Ordering::SeqCst), n_observers);
        }
    }
}

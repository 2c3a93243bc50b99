//! Simulated replicas answering a read on their own thread
use std::{thread, time::Duration};

use rand::Rng;

use super::fault::Fault;
use crate::future::settable::{ResultHandle, SettableResult};

#[derive(Clone, Debug)]
pub struct Replica<V> {
    /// `None` means the replica has no value for the key
    pub reply: Option<V>,
    pub delay: Duration,
    pub fault: Fault,
}

impl<V: Clone + Send + 'static> Replica<V> {
    pub fn new(reply: Option<V>) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            fault: Fault::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Random delay in `[0, max_delay)`
    pub fn with_random_delay(self, max_delay: Duration) -> Self {
        let max_ms = max_delay.as_millis().max(1) as u64;
        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..max_ms));
        self.with_delay(delay)
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    /// Spawns a thread that replies after `delay`. The returned handle observes the reply.
    pub fn spawn(self) -> ResultHandle<Option<V>> {
        let result = SettableResult::new();
        let handle = result.handle();
        thread::spawn(move || {
            thread::sleep(self.delay);
            if !self.fault.inject(&result, "replica read") {
                result.succeed(self.reply);
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Replica;
    use crate::{
        future::AsyncResult,
        test_utils::fault::{Fault, Kind},
    };

    #[test]
    fn test_replica_replies() {
        let handle = Replica::new(Some(7u32))
            .with_delay(Duration::from_millis(5))
            .spawn();
        assert_eq!(handle.get().unwrap(), Some(7));
    }

    #[test]
    fn test_replica_faults() {
        let failed = Replica::new(Some(1u32))
            .with_fault(Fault::always(Kind::Fail))
            .spawn();
        assert!(matches!(
            failed.get(),
            Err(crate::error::Error::Io { .. })
        ));

        let cancelled = Replica::new(Some(1u32))
            .with_fault(Fault::always(Kind::Cancel))
            .spawn();
        assert!(cancelled.get().unwrap_err().is_cancelled());

        let hanging = Replica::new(Some(1u32))
            .with_fault(Fault::always(Kind::Hang))
            .spawn();
        assert!(hanging
            .get_timeout(Duration::from_millis(20))
            .unwrap_err()
            .is_timeout());
        assert!(!hanging.is_done());
    }

    #[test]
    fn test_random_delay_is_bounded() {
        let replica = Replica::new(None::<u32>).with_random_delay(Duration::from_millis(10));
        assert!(replica.delay < Duration::from_millis(10));
    }
}

//! Module that contains utility functions for fault injection in test code
use crate::{error::Error, future::settable::SettableResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum When {
    Always,
    #[default]
    Never,
}

/// What a faulty producer does instead of delivering its value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Kind {
    /// fails with [`Error::Io`]
    #[default]
    Fail,
    Cancel,
    /// never completes
    Hang,
}

/// A fault is injected into a producer based on the [`When`]
#[derive(Clone, Copy, Debug, Default)]
pub struct Fault {
    pub when: When,
    pub kind: Kind,
}

impl Fault {
    pub fn always(kind: Kind) -> Self {
        Self {
            when: When::Always,
            kind,
        }
    }

    /// Completes `result` according to this fault. Returns false if no fault was injected,
    /// meaning the caller still owns the completion of `result`.
    pub fn inject<V: Clone + Send + 'static>(&self, result: &SettableResult<V>, origin: &str) -> bool {
        match self.when {
            When::Always => {
                match self.kind {
                    Kind::Fail => {
                        result.fail(Error::Io {
                            reason: format!("Mocked error on {}", origin),
                        });
                    }
                    Kind::Cancel => {
                        result.cancel();
                    }
                    Kind::Hang => { /* noop */ }
                }
                true
            }
            When::Never => false,
        }
    }
}

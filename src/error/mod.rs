//! This module defines the errors that can be observed by callers of rlquorum.
//!
//! Note that internal invariant violations (ie: bugs in the bookkeeping of a result) are NOT
//! represented here. Those are raised as panics in the offending operation and must never be
//! converted into one of the variants below.

use std::{fmt::Display, time::Duration};

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Error {
    /// Malformed input provided to a constructor or to a merge call
    InvalidArgument { reason: String },
    /// The result was cancelled before a value or a failure was set
    Cancelled,
    /// A bounded get expired while the result was still pending
    Timeout { timeout: Duration },
    /// The votes were too fragmented to elect a winner above the threshold
    QuorumNotReached { threshold: usize, reason: String },
    /// Failure set by a producer
    Generic { reason: String },
    Io { reason: String },
    InvalidConfig { reason: String },
}

impl Error {
    /// Returns true if this is an instance of a [`Error::Cancelled`] variant
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns true if this is an instance of a [`Error::Timeout`] variant
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this is an instance of a [`Error::QuorumNotReached`] variant
    pub fn is_quorum_not_reached(&self) -> bool {
        matches!(self, Error::QuorumNotReached { .. })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

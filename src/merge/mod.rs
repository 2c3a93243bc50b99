//! Module that contains the [`Merger`] abstraction used to collapse the values produced by several
//! sources into a single answer.
//!
//! A plain [`Merger`] accepts any collection. A [`ConditionalMerger`] only accepts collections for which
//! [`ConditionalMerger::can_merge`] holds, and callers are expected to check it first. Calling
//! [`Merger::merge`] with an insufficient collection is an input contract violation ([`crate::error::Error::InvalidArgument`]),
//! not a soft "nothing to return" outcome.
use crate::error::Result;

pub mod threshold;

/// Generic interface for merging data
pub trait Merger<V>: Send + Sync {
    /// Merges `values` (non-empty by convention) into a single value
    fn merge(&self, values: Vec<V>) -> Result<V>;
}

/// A [`Merger`] that only merges when enough values are given
pub trait ConditionalMerger<V>: Merger<V> {
    /// Returns true if there are enough values to be merged
    fn can_merge(&self, values: &[V]) -> bool;
}

impl<V, F> Merger<V> for F
where
    F: Fn(Vec<V>) -> Result<V> + Send + Sync,
{
    fn merge(&self, values: Vec<V>) -> Result<V> {
        self(values)
    }
}

/// A [`Merger`] that ignores its input and always returns the same value
#[derive(Clone, Debug, Default)]
pub struct FixedMerger<V> {
    value: V,
}

impl<V> FixedMerger<V> {
    pub fn new(value: V) -> Self {
        Self { value }
    }
}

impl<V: Clone + Send + Sync> Merger<V> for FixedMerger<V> {
    fn merge(&self, _values: Vec<V>) -> Result<V> {
        Ok(self.value.clone())
    }
}

//! [`ThresholdMerger`] turns "N replies" into "the quorum-confirmed reply".
//!
//! It merges input using a voting algorithm ([`Mjrty`] by default) to select the value that at least
//! `threshold` replies agree on. Replies are `Option<V>`: `None` stands for a source that had no value and
//! never counts as a vote.
use std::sync::Arc;

use tracing::{event, Level};

use super::{ConditionalMerger, Merger};
use crate::{
    error::{Error, Result},
    vote::{mjrty::Mjrty, validate_threshold, voter::HashVoter, Election, Voter},
};

/// Definition of a threshold [`ConditionalMerger`]. Immutable, so a single instance can be shared by concurrent merges.
pub struct ThresholdMerger<V, E = Mjrty> {
    /// minimum number of agreeing replies
    threshold: usize,
    voter: Arc<dyn Voter<V>>,
    election: E,
}

impl<V, E: std::fmt::Debug> std::fmt::Debug for ThresholdMerger<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdMerger")
            .field("threshold", &self.threshold)
            .field("election", &self.election)
            .finish()
    }
}

impl<V: std::hash::Hash + 'static> ThresholdMerger<V> {
    /// Votes are computed with [`HashVoter`]
    ///
    /// # Error
    /// This function returns an error if `threshold` is 0
    pub fn new(threshold: usize) -> Result<Self> {
        Self::with_voter(threshold, Arc::new(HashVoter))
    }
}

impl<V> ThresholdMerger<V> {
    pub fn with_voter(threshold: usize, voter: Arc<dyn Voter<V>>) -> Result<Self> {
        Self::with_election(threshold, voter, Mjrty)
    }
}

impl<V, E: Election> ThresholdMerger<V, E> {
    pub fn with_election(threshold: usize, voter: Arc<dyn Voter<V>>, election: E) -> Result<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            voter,
            election,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl<V, E> Merger<Option<V>> for ThresholdMerger<V, E>
where
    V: PartialEq + Clone,
    E: Election,
{
    /// # Error
    /// [`Error::InvalidArgument`] if fewer than `threshold` values are given (even if the caller skipped
    /// [`ConditionalMerger::can_merge`]), or the election error if the replies are too fragmented.
    fn merge(&self, values: Vec<Option<V>>) -> Result<Option<V>> {
        if !self.can_merge(&values) {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "ThresholdMerger requires at least {} values, got {}",
                    self.threshold,
                    values.len()
                ),
            });
        }

        let winner = self
            .election
            .elect(self.threshold, self.voter.as_ref(), &values)?;
        event!(
            Level::DEBUG,
            "threshold merge over {} values: winner found: {}",
            values.len(),
            winner.is_some()
        );

        Ok(winner.cloned())
    }
}

impl<V, E> ConditionalMerger<Option<V>> for ThresholdMerger<V, E>
where
    V: PartialEq + Clone,
    E: Election,
{
    fn can_merge(&self, values: &[Option<V>]) -> bool {
        values.len() >= self.threshold
    }
}

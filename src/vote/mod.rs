//! Module that contains voting algorithms used to select the majority element out of a collection of replies.
//!
//! An [`Election`] picks the element that appears at least `threshold` times. A [`Voter`] maps each element
//! into an integer vote code that the election compares during its pairing pass.
//!
//! Implementations of [`Voter`] MUST map equal values to equal codes. The default election
//! ([`mjrty::Mjrty`]) pairs votes by code but confirms a winner by value equality, so a voter that breaks
//! this contract can make a true majority go unnoticed.
use crate::error::{Error, Result};

pub mod mjrty;
pub mod voter;

/// Vote code reserved for positions that have no vote (ie: `None`)
pub const NO_VOTE: i32 = -1;

/// Maps a value to the integer that represents its vote
pub trait Voter<V>: Send + Sync {
    /// Returns [`NO_VOTE`] for `None`
    fn vote(&self, value: Option<&V>) -> i32;
}

/// An [`Election`] implements a voting algorithm to select the majority element in a given collection of votes.
pub trait Election: Send + Sync {
    /// Selects the element that occurs at least `threshold` times in `votes`. `None` entries are not votes.
    ///
    /// Returns `Ok(None)` if no element qualifies.
    ///
    /// # Error
    /// [`Error::QuorumNotReached`] if the votes are split across more than `threshold` distinct values
    /// and none of them reached the threshold. [`Error::InvalidArgument`] if `threshold` is 0.
    fn elect<'a, V, T>(
        &self,
        threshold: usize,
        voter: &T,
        votes: &'a [Option<V>],
    ) -> Result<Option<&'a V>>
    where
        V: PartialEq,
        T: Voter<V> + ?Sized;

    /// Same as [`Election::elect`] over an array of integers, where `no_vote` marks positions without a vote.
    /// Returns the index of the first occurrence of the winner.
    fn elect_i32(&self, threshold: usize, no_vote: i32, votes: &[i32]) -> Result<Option<usize>>;

    /// See [`Election::elect_i32`]
    fn elect_i64(&self, threshold: usize, no_vote: i64, votes: &[i64]) -> Result<Option<usize>>;
}

pub(crate) fn validate_threshold(threshold: usize) -> Result<()> {
    if threshold == 0 {
        return Err(Error::InvalidArgument {
            reason: "threshold must be at least 1".to_string(),
        });
    }

    Ok(())
}

//! Threshold majority vote based on MJRTY.
//!
//! MJRTY (Boyer & Moore, "MJRTY - A Fast Majority Vote Algorithm", 1991) finds the majority element of a
//! sequence in two passes and O(1) extra space:
//!  1. Pairing pass: keep a (candidate, count) pair. A vote equal to the candidate increments the count,
//!     any other vote decrements it. When the count reaches 0 the candidate is dropped and the next vote
//!     becomes the new candidate. Positions without a vote are skipped.
//!  2. Counting pass: only needed when the count left by the pairing pass is below the threshold.
//!     Votes equal to the candidate are recounted and the candidate wins as soon as the recount reaches
//!     the threshold.
//!
//! If the recount does not reach the threshold, the votes are either insufficient (no winner) or split across
//! more than `threshold` distinct values, in which case no defensible majority exists and
//! [`Error::QuorumNotReached`] is returned instead of a plurality.
use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use tracing::{event, Level};

use super::{validate_threshold, Election, Voter};
use crate::error::{Error, Result};

/// Threshold majority [`Election`]
#[derive(Clone, Copy, Debug, Default)]
pub struct Mjrty;

impl Election for Mjrty {
    fn elect<'a, V, T>(
        &self,
        threshold: usize,
        voter: &T,
        votes: &'a [Option<V>],
    ) -> Result<Option<&'a V>>
    where
        V: PartialEq,
        T: Voter<V> + ?Sized,
    {
        validate_threshold(threshold)?;

        // first pass: pairing
        let mut winner: Option<(&V, i32)> = None;
        let mut count = 0usize;
        for vote in votes.iter().flatten() {
            let code = voter.vote(Some(vote));
            match winner {
                None => {
                    winner = Some((vote, code));
                    count = 1;
                }
                Some((_, winner_code)) if winner_code == code => count += 1,
                Some(_) => {
                    count -= 1;
                    if count == 0 {
                        winner = None;
                    }
                }
            }
        }

        if let Some((candidate, _)) = winner {
            if count >= threshold {
                return Ok(Some(candidate));
            }

            // second pass: counting. Value equality, a code collision is not a match
            let mut recount = 0usize;
            for vote in votes.iter().flatten() {
                if vote == candidate {
                    recount += 1;
                    if recount >= threshold {
                        return Ok(Some(candidate));
                    }
                }
            }
        }

        let groups = distinct_groups(voter, votes, threshold + 1);
        no_majority(threshold, groups, votes.len()).map(|_| None)
    }

    fn elect_i32(&self, threshold: usize, no_vote: i32, votes: &[i32]) -> Result<Option<usize>> {
        elect_indexed(threshold, no_vote, votes)
    }

    fn elect_i64(&self, threshold: usize, no_vote: i64, votes: &[i64]) -> Result<Option<usize>> {
        elect_indexed(threshold, no_vote, votes)
    }
}

/// Pairing and counting passes over primitive votes, where `no_vote` marks positions without a vote
fn elect_indexed<T: Copy + Eq + Hash>(
    threshold: usize,
    no_vote: T,
    votes: &[T],
) -> Result<Option<usize>> {
    validate_threshold(threshold)?;

    // first pass: pairing
    let mut winner = no_vote;
    let mut count = 0usize;
    for &vote in votes {
        if vote == no_vote {
            continue;
        } else if winner == no_vote {
            winner = vote;
            count = 1;
        } else if winner == vote {
            count += 1;
        } else {
            count -= 1;
            if count == 0 {
                winner = no_vote;
            }
        }
    }

    if winner != no_vote {
        let first_occurrence = votes.iter().position(|&vote| vote == winner);
        if count >= threshold {
            return Ok(first_occurrence);
        }

        // second pass: counting
        let mut recount = 0usize;
        for &vote in votes {
            if vote == winner {
                recount += 1;
                if recount >= threshold {
                    return Ok(first_occurrence);
                }
            }
        }
    }

    let groups = distinct_values(votes, no_vote, threshold + 1);
    no_majority(threshold, groups, votes.len()).map(|_| None)
}

/// Counts distinct values in `votes`, stopping at `limit`.
/// Values are bucketed by vote code and told apart by equality, so at most `limit` values are kept.
fn distinct_groups<V, T>(voter: &T, votes: &[Option<V>], limit: usize) -> usize
where
    V: PartialEq,
    T: Voter<V> + ?Sized,
{
    let mut buckets: HashMap<i32, Vec<&V>> = HashMap::new();
    let mut groups = 0;
    for vote in votes.iter().flatten() {
        let bucket = buckets.entry(voter.vote(Some(vote))).or_default();
        if !bucket.iter().any(|member| *member == vote) {
            bucket.push(vote);
            groups += 1;
            if groups >= limit {
                break;
            }
        }
    }

    groups
}

/// Same as [`distinct_groups`] for primitive votes, skipping `no_vote`
fn distinct_values<T: Copy + Eq + Hash>(votes: &[T], no_vote: T, limit: usize) -> usize {
    let mut seen = HashSet::new();
    for &vote in votes {
        if vote != no_vote && seen.insert(vote) && seen.len() >= limit {
            break;
        }
    }

    seen.len()
}

/// Decides between "no winner" and [`Error::QuorumNotReached`] once the recount failed
fn no_majority(threshold: usize, groups: usize, n_votes: usize) -> Result<()> {
    if groups > threshold {
        event!(
            Level::WARN,
            "no majority found above threshold {} ({} votes)",
            threshold,
            n_votes
        );
        return Err(Error::QuorumNotReached {
            threshold,
            reason: format!(
                "votes split across more than {} distinct values",
                threshold
            ),
        });
    }

    event!(
        Level::DEBUG,
        "not enough votes to reach threshold {} ({} votes)",
        threshold,
        n_votes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};
    use rand::{seq::SliceRandom, Rng};

    use super::Mjrty;
    use crate::{
        error::Error,
        vote::{voter::HashVoter, Election, Voter, NO_VOTE},
    };

    fn elect<'a>(threshold: usize, votes: &'a [Option<&'static str>]) -> Option<&'a &'static str> {
        Mjrty.elect(threshold, &HashVoter, votes).unwrap()
    }

    #[test]
    fn test_majority_regardless_of_position() {
        let votes = [Some("A"), Some("B"), Some("A"), Some("A"), Some("C")];
        assert_eq!(elect(3, &votes), Some(&"A"));

        let votes = [Some("B"), Some("C"), Some("A"), Some("A"), Some("A")];
        assert_eq!(elect(3, &votes), Some(&"A"));
    }

    #[test]
    fn test_insufficient_votes_is_not_an_error() {
        let votes = [Some("A"), Some("B"), Some("C")];
        assert_eq!(elect(3, &votes), None);
    }

    #[test]
    fn test_tie_has_no_winner() {
        let votes = [Some("A"), Some("B"), Some("A"), Some("B")];
        assert_eq!(elect(2, &votes), None);
    }

    #[test]
    fn test_nulls_never_vote() {
        let votes = [Some("A"), None, Some("A"), None, None];
        assert_eq!(elect(2, &votes), Some(&"A"));

        let votes: [Option<&str>; 3] = [None, None, None];
        assert_eq!(elect(1, &votes), None);
    }

    #[test]
    fn test_single_vote_threshold_one() {
        let votes = [None, Some("A")];
        assert_eq!(elect(1, &votes), Some(&"A"));
    }

    #[test]
    fn test_fragmented_votes_fail() {
        let votes = [Some("A"), Some("B"), Some("C")];
        let err = Mjrty.elect(2, &HashVoter, &votes).unwrap_err();
        assert!(err.is_quorum_not_reached());

        // every vote got paired off, no candidate survives the first pass
        let votes = [Some("A"), Some("B"), Some("C"), Some("D")];
        assert!(Mjrty.elect(2, &HashVoter, &votes).is_err());
        assert!(Mjrty.elect_i32(2, -1, &[1, 2, 3, 4]).is_err());

        let votes = [Some("A"), Some("B"), Some("C"), Some("D"), Some("D")];
        let err = Mjrty.elect(3, &HashVoter, &votes).unwrap_err();
        assert!(matches!(err, Error::QuorumNotReached { threshold: 3, .. }));
    }

    #[test]
    fn test_only_nulls_disagree() {
        let votes = [Some("A"), None, None];
        assert_eq!(elect(2, &votes), None);

        // nulls do not excuse disagreeing votes
        let votes = [Some("A"), Some("B"), Some("C"), None];
        assert!(Mjrty.elect(2, &HashVoter, &votes).is_err());
    }

    #[test]
    fn test_invalid_threshold() {
        let votes = [Some("A")];
        assert!(matches!(
            Mjrty.elect(0, &HashVoter, &votes),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            Mjrty.elect_i32(0, -1, &[1]),
            Err(Error::InvalidArgument { .. })
        ));
    }

    /// Maps every value to the same code, so the pairing pass can't tell values apart
    struct CollidingVoter;

    impl Voter<&'static str> for CollidingVoter {
        fn vote(&self, value: Option<&&'static str>) -> i32 {
            match value {
                Some(_) => 7,
                None => NO_VOTE,
            }
        }
    }

    #[test]
    fn test_code_collision_is_not_a_match_when_counting() {
        // pairing sees four votes for "A" (count 4 >= 4) and returns right away
        let votes = [Some("A"), Some("B"), Some("B"), Some("B")];
        assert_eq!(
            Mjrty.elect(4, &CollidingVoter, &votes).unwrap(),
            Some(&"A")
        );

        // recount only counts values equal to "A"
        let votes = [Some("A"), Some("B"), Some("B")];
        assert_eq!(Mjrty.elect(4, &CollidingVoter, &votes).unwrap(), None);
    }

    #[test]
    fn test_elect_i32_returns_first_occurrence() {
        assert_eq!(Mjrty.elect_i32(3, -1, &[5, 7, 5, 5, 9]).unwrap(), Some(0));
        assert_eq!(Mjrty.elect_i32(2, -1, &[-1, 4, -1, 4]).unwrap(), Some(1));
        assert_eq!(Mjrty.elect_i32(2, -1, &[1, 2, 1, 2]).unwrap(), None);
        assert_eq!(Mjrty.elect_i32(3, 0, &[1, 2, 3]).unwrap(), None);
        assert_eq!(Mjrty.elect_i32(1, 0, &[]).unwrap(), None);
        assert!(Mjrty.elect_i32(2, 0, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_elect_i64() {
        let votes = [i64::MAX, 3, i64::MAX, 3, 3];
        assert_eq!(Mjrty.elect_i64(3, i64::MIN, &votes).unwrap(), Some(1));
        assert_eq!(Mjrty.elect_i64(3, 3, &votes).unwrap(), None);
        assert_eq!(Mjrty.elect_i64(2, 3, &votes).unwrap(), Some(0));
    }

    #[test]
    fn test_large_split_without_majority() {
        // nulls first, then two alternating values: no winner, and no quadratic rescan
        let n = 200_000;
        let mut as_i32 = vec![-1; n / 2];
        as_i32.extend((0..n / 2).map(|i| (i % 2) as i32));
        assert_eq!(Mjrty.elect_i32(2, -1, &as_i32).unwrap(), None);

        let as_i64: Vec<i64> = as_i32.iter().map(|&v| v as i64).collect();
        assert_eq!(Mjrty.elect_i64(2, -1, &as_i64).unwrap(), None);

        let as_options: Vec<Option<u32>> = as_i32
            .iter()
            .map(|&v| if v == -1 { None } else { Some(v as u32) })
            .collect();
        assert_eq!(Mjrty.elect(2, &HashVoter, &as_options).unwrap(), None);

        // a third value tips it over into fragmentation
        let mut fragmented = as_options;
        fragmented.push(Some(2));
        assert!(Mjrty
            .elect(2, &HashVoter, &fragmented)
            .unwrap_err()
            .is_quorum_not_reached());
    }

    #[derive(Clone, Debug)]
    struct MajorityInput {
        threshold: usize,
        votes: Vec<Option<u8>>,
    }

    /// A shuffled sequence in which value 42 occurs `threshold` times and holds a strict majority
    /// of the non-null votes. The remaining votes are random values (different from 42) or nulls.
    impl Arbitrary for MajorityInput {
        fn arbitrary(_: &mut Gen) -> Self {
            let mut rng = rand::thread_rng();
            let threshold = rng.gen_range(1..10);
            let n_others = rng.gen_range(0..threshold);
            let n_nulls = rng.gen_range(0..5);

            let mut votes = vec![Some(42u8); threshold];
            for _ in 0..n_others {
                votes.push(Some(rng.gen_range(0..42)));
            }
            votes.extend(std::iter::repeat(None).take(n_nulls));
            votes.shuffle(&mut rng);

            Self { threshold, votes }
        }
    }

    #[quickcheck]
    fn test_strict_majority_always_wins(input: MajorityInput) -> bool {
        Mjrty.elect(input.threshold, &HashVoter, &input.votes).unwrap() == Some(&42)
    }

    #[quickcheck]
    fn test_primitive_and_generic_agree(votes: Vec<u8>, threshold: u8) -> bool {
        let threshold = (threshold % 5) as usize + 1;
        let as_i32: Vec<i32> = votes
            .iter()
            .map(|&v| if v % 4 == 0 { -1 } else { (v % 3) as i32 })
            .collect();
        let as_options: Vec<Option<i32>> = as_i32
            .iter()
            .map(|&v| if v == -1 { None } else { Some(v) })
            .collect();

        let indexed = Mjrty.elect_i32(threshold, -1, &as_i32);
        let generic = Mjrty.elect(threshold, &HashVoter, &as_options);
        match (indexed, generic) {
            (Ok(Some(index)), Ok(Some(value))) => as_i32[index] == *value,
            (Ok(None), Ok(None)) => true,
            (Err(a), Err(b)) => a == b,
            _ => false,
        }
    }
}

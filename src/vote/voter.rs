//! Default [`Voter`] implementations
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    io::Cursor,
};

use murmur3::murmur3_32;

use super::{Voter, NO_VOTE};

/// Folds a 32 bit hash into a vote code, keeping [`NO_VOTE`] reserved
fn vote_code(hash: u32) -> i32 {
    let code = hash as i32;
    if code == NO_VOTE {
        i32::MAX
    } else {
        code
    }
}

/// A [`Voter`] based on the [`Hash`] implementation of the value
#[derive(Clone, Copy, Debug, Default)]
pub struct HashVoter;

impl<V: Hash> Voter<V> for HashVoter {
    fn vote(&self, value: Option<&V>) -> i32 {
        let Some(value) = value else {
            return NO_VOTE;
        };

        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        let hash = hasher.finish();
        vote_code((hash ^ (hash >> 32)) as u32)
    }
}

/// A [`Voter`] for byte buffers (eg: [`bytes::Bytes`]) that hashes their content with murmur3
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesVoter;

/// Vote code of a byte buffer: its murmur3 (seed 0) hash
fn murmur3_vote(bytes: &[u8]) -> i32 {
    // reading from an in-memory cursor never fails
    let hash = murmur3_32(&mut Cursor::new(bytes), 0).unwrap_or_default();
    vote_code(hash)
}

impl<V: AsRef<[u8]>> Voter<V> for BytesVoter {
    fn vote(&self, value: Option<&V>) -> i32 {
        match value {
            Some(value) => murmur3_vote(value.as_ref()),
            None => NO_VOTE,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{murmur3_vote, BytesVoter, HashVoter};
    use crate::vote::{Voter, NO_VOTE};

    #[test]
    fn test_none_is_no_vote() {
        assert_eq!(Voter::<String>::vote(&HashVoter, None), NO_VOTE);
        assert_eq!(Voter::<Bytes>::vote(&BytesVoter, None), NO_VOTE);
    }

    #[test]
    fn test_equal_values_equal_votes() {
        let a = "replica value".to_string();
        let b = "replica value".to_string();
        assert_eq!(HashVoter.vote(Some(&a)), HashVoter.vote(Some(&b)));
        assert_ne!(HashVoter.vote(Some(&a)), NO_VOTE);

        let a = Bytes::from_static(b"replica value");
        let b = Bytes::copy_from_slice(b"replica value");
        assert_eq!(BytesVoter.vote(Some(&a)), BytesVoter.vote(Some(&b)));
        assert_ne!(
            BytesVoter.vote(Some(&a)),
            BytesVoter.vote(Some(&Bytes::from_static(b"other value")))
        );
    }

    #[test]
    fn test_bytes_voter_hashes_content() {
        let value = Bytes::from_static(b"replica value");
        assert_eq!(BytesVoter.vote(Some(&value)), murmur3_vote(b"replica value"));
        assert_eq!(BytesVoter.vote(Some(&b"replica value".to_vec())), murmur3_vote(b"replica value"));
    }
}

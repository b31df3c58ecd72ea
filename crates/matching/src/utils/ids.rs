//! Deterministic ordering over group ids.
//!
//! Ids compare byte-wise lexicographically (`str`'s `Ord`). Both sides of a
//! pair evaluate the same comparison, so they agree on the chatroom id and
//! on which of them finalizes.

use groupting_database::PAIR_SEPARATOR;

use crate::types::{MatchError, MatchResult};

/// The two ids, smaller first.
pub fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Order-independent chatroom id for a pair of groups: `"{smaller}_{greater}"`.
///
/// Only unambiguous because group ids never contain [`PAIR_SEPARATOR`].
pub fn canonical_pair_id(a: &str, b: &str) -> String {
    let (low, high) = ordered(a, b);
    format!("{low}{PAIR_SEPARATOR}{high}")
}

/// Whether `self_id` is the side that creates the chatroom for this pair.
pub fn is_finalizer(self_id: &str, peer_id: &str) -> MatchResult<bool> {
    if self_id == peer_id {
        return Err(MatchError::SelfMatch {
            id: self_id.to_string(),
        });
    }
    Ok(self_id < peer_id)
}

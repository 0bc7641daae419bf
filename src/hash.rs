use std::hash::Hash;

use siphasher::sip128::{Hasher128, SipHasher13};

use crate::tag::TypeTag;

/// Produce a 128-bit hash of a tagged payload.
///
/// The tag is mixed in first so that equal payloads of different request
/// types land in different buckets.
#[inline]
pub fn hash<T: Hash + ?Sized>(tag: TypeTag, value: &T) -> u128 {
    let mut state = SipHasher13::new();
    tag.hash(&mut state);
    value.hash(&mut state);
    state.finish128().as_u128()
}

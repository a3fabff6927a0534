//! Key hashing.
//!
//! The cache treats the hash function as an opaque 32-bit function over key
//! bytes. The top `shard_bits` bits of the result route a key to its shard;
//! the low bits index the shard's bucket array, so shard routing and bucket
//! indexing never collapse onto the same bit range.

use core::hash::Hasher;
use twox_hash::XxHash32;

/// Fixed seed so routing is stable for the lifetime of the process.
const SEED: u32 = 0;

/// Hashes a key to the 32-bit value used for sharding and bucket indexing.
#[inline]
pub(crate) fn hash_key(key: &[u8]) -> u32 {
    let mut hasher = XxHash32::with_seed(SEED);
    hasher.write(key);
    // XxHash32 yields a 32-bit digest zero-extended to u64.
    hasher.finish() as u32
}

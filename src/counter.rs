//! Integer counter helpers.
//!
//! Thin convenience layer over the generic merge protocol for caches whose
//! payloads are `u64` counters. The cache core stays payload-agnostic; these
//! helpers just package the add-merge closures.

use crate::cache::LruCache;

/// Charge of one counter entry: the key bytes plus the eight-byte value.
fn counter_charge(key: &[u8]) -> u64 {
    (key.len() + core::mem::size_of::<u64>()) as u64
}

/// Adds `delta` to the counter at `key`, creating it at `delta` if absent.
/// Returns the counter's previous value, or `None` when the key was absent
/// or the cache is disabled.
pub fn add(cache: &LruCache<u64>, key: &[u8], delta: u64) -> Option<u64> {
    cache
        .merge(
            key,
            delta,
            counter_charge(key),
            |prior, value| prior.copied().unwrap_or(0).wrapping_add(value),
            |_, _, charge| charge,
        )
        .ok()
        .flatten()
}

/// Adds one to the counter at `key`. See [`add`].
pub fn increment(cache: &LruCache<u64>, key: &[u8]) -> Option<u64> {
    add(cache, key, 1)
}

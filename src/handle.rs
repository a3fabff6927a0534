//! Cache entry storage.
//!
//! Entries live in a per-shard arena of [`Slot`]s addressed by dense `u32`
//! indices. Every intrusive link (recency list, in-use list, hash-bucket
//! chain) is an index into that arena, which keeps the pointer graph in safe
//! Rust and makes slot recycling a free-list push.

use std::sync::Arc;

/// Destruction hook invoked exactly once when an entry leaves the cache
/// (evicted, erased, replaced, or pruned).
///
/// Shared so a merge can re-attach the existing entry's hook to the merged
/// entry while the replaced entry still fires its own copy once.
pub type Deleter<V> = Arc<dyn Fn(&[u8], &V) + Send + Sync>;

/// Reserved index meaning "no slot".
pub(crate) const NIL: u32 = u32::MAX;

/// One cache entry: an owned copy of the key, the caller's payload, and the
/// bookkeeping the shard needs to charge, pin, and retire it.
pub(crate) struct Handle<V> {
    pub key: Box<[u8]>,
    pub value: V,
    /// Cost this entry contributes to the owning shard's usage.
    pub charge: u64,
    /// Cached hash of `key`; used for shard routing and chain comparisons.
    pub hash: u32,
    pub deleter: Option<Deleter<V>>,
    /// References, including the cache's own, if present.
    pub refs: u32,
    /// Whether the entry is still indexed by the shard.
    pub in_cache: bool,
    /// Whether the entry is parked on the in-use list.
    pub on_in_use: bool,
}

impl<V> Handle<V> {
    /// Runs the destruction hook, if any. The caller is responsible for
    /// invoking this exactly once per handle.
    pub fn fire_deleter(&self) {
        if let Some(deleter) = &self.deleter {
            deleter(&self.key, &self.value);
        }
    }
}

/// Arena slot: three intrusive links, a recycling guard, and the entry
/// payload. `handle` is `None` for list sentinels and free-list members.
pub(crate) struct Slot<V> {
    /// Previous entry on the recency or in-use list.
    pub prev: u32,
    /// Next entry on the recency or in-use list; doubles as the free-list
    /// link while the slot is unoccupied.
    pub next: u32,
    /// Next slot in this entry's hash-bucket chain.
    pub chain: u32,
    /// Bumped every time the slot is recycled; stale pin tokens fail against
    /// it instead of touching an unrelated entry.
    pub generation: u32,
    pub handle: Option<Handle<V>>,
}

impl<V> Slot<V> {
    /// A list sentinel: circularly linked to itself, never occupied.
    pub fn sentinel(index: u32) -> Self {
        Slot {
            prev: index,
            next: index,
            chain: NIL,
            generation: 0,
            handle: None,
        }
    }

    /// A freshly occupied slot, not yet linked anywhere.
    pub fn occupied(handle: Handle<V>) -> Self {
        Slot {
            prev: NIL,
            next: NIL,
            chain: NIL,
            generation: 0,
            handle: Some(handle),
        }
    }
}

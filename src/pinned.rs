//! Sharded cache façade with pinning semantics.
//!
//! [`PinnedLruCache`] returns a [`CacheHandle`] from lookups instead of a
//! value. While a handle is outstanding the entry cannot be evicted: it sits
//! on its shard's in-use list, invisible to the eviction scan, and returns to
//! the warm end of the recency list when the last handle is released.
//!
//! Erasing or replacing a pinned entry never fails and never blocks: the
//! entry is unlinked from the hash index immediately ("latest wins") and
//! lives on, orphaned, until its pinners release it. The deleter still fires
//! exactly once, at the final release.

use std::collections::BTreeMap;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::handle::Deleter;
use crate::hash::hash_key;
use crate::metrics::CacheMetrics;

use crate::cache::ShardSet;

/// Caller-held claim on a cache entry.
///
/// A handle is a capability, not a reference: it stays valid across
/// evictions, erasures, and replacements of its entry until it is passed to
/// [`PinnedLruCache::release`]. Handles are deliberately neither `Clone` nor
/// `Copy`: each one stands for exactly one reference the cache is counting.
///
/// Dropping a handle without releasing it leaks the entry (it can never be
/// evicted); releasing a handle twice is a programmer error and panics.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "unreleased handles pin their entry in the cache forever"]
pub struct CacheHandle {
    shard: u32,
    slot: u32,
    generation: u32,
}

/// A concurrent, sharded, charge-bounded LRU cache whose lookups pin entries
/// in place.
///
/// # Examples
///
/// ```
/// use sharded_lru::{CacheConfig, PinnedLruCache};
///
/// let cache: PinnedLruCache<Vec<u8>> =
///     PinnedLruCache::new(CacheConfig::new(1024).with_shard_bits(1));
///
/// let handle = cache.insert(b"k", vec![1, 2, 3], 3, None).unwrap();
/// assert_eq!(cache.value_of(&handle), vec![1, 2, 3]);
/// cache.release(handle);
///
/// let handle = cache.lookup(b"k").unwrap();
/// cache.release(handle);
/// ```
pub struct PinnedLruCache<V> {
    shards: ShardSet<V>,
}

impl<V> PinnedLruCache<V> {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        PinnedLruCache {
            shards: ShardSet::new(config),
        }
    }

    /// Inserts an entry and returns a handle already pinning it.
    ///
    /// Replaces any existing entry for the key; outstanding handles on the
    /// replaced entry stay valid and its deleter fires once they are all
    /// released. Fails only on a zero-capacity cache (the deleter has fired
    /// by then and no handle is minted).
    pub fn insert(
        &self,
        key: &[u8],
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
    ) -> Result<CacheHandle> {
        let hash = hash_key(key);
        let shard = self.shards.shard_index(hash);
        let (slot, generation) = self
            .shards
            .shard_at(shard)
            .lock()
            .insert_pinned(key, hash, value, charge, deleter)?;
        Ok(CacheHandle {
            shard: shard as u32,
            slot,
            generation,
        })
    }

    /// Looks up `key`, pinning the entry and crediting its recency.
    pub fn lookup(&self, key: &[u8]) -> Option<CacheHandle> {
        let hash = hash_key(key);
        let shard = self.shards.shard_index(hash);
        let (slot, generation) = self.shards.shard_at(shard).lock().lookup(key, hash)?;
        Some(CacheHandle {
            shard: shard as u32,
            slot,
            generation,
        })
    }

    /// Looks up `key` and pins the entry **without** touching its recency:
    /// the entry keeps its place in the eviction order. Useful for scans that
    /// must not disturb the working set.
    pub fn reference(&self, key: &[u8]) -> Option<CacheHandle> {
        let hash = hash_key(key);
        let shard = self.shards.shard_index(hash);
        let (slot, generation) = self.shards.shard_at(shard).lock().reference(key, hash)?;
        Some(CacheHandle {
            shard: shard as u32,
            slot,
            generation,
        })
    }

    /// Releases a handle, surrendering its pin. The entry becomes evictable
    /// again once its last handle is gone; an orphaned entry is destroyed
    /// here.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this cache or was already
    /// released (its slot generation no longer matches).
    pub fn release(&self, handle: CacheHandle) {
        self.shard_of(&handle).lock().release(handle.slot, handle.generation);
    }

    /// Returns a clone of the pinned entry's value.
    ///
    /// # Panics
    ///
    /// Panics on a stale or foreign handle.
    pub fn value_of(&self, handle: &CacheHandle) -> V
    where
        V: Clone,
    {
        self.value_with(handle, |value| value.clone())
    }

    /// Applies `f` to the pinned entry's value under the shard lock, without
    /// cloning. Prefer this over [`value_of`](Self::value_of) when only a
    /// borrow is needed.
    ///
    /// # Panics
    ///
    /// Panics on a stale or foreign handle.
    pub fn value_with<R>(&self, handle: &CacheHandle, f: impl FnOnce(&V) -> R) -> R {
        self.shard_of(handle)
            .lock()
            .with_value(handle.slot, handle.generation, |_, value| f(value))
    }

    /// Removes `key` from the cache. Pinned entries are orphaned rather than
    /// destroyed; absent keys are a no-op.
    pub fn erase(&self, key: &[u8]) {
        let hash = hash_key(key);
        self.shards.shard_for(hash).lock().erase(key, hash);
    }

    /// Evicts every unpinned entry. Pinned entries survive with their
    /// charges still counted.
    pub fn prune(&self) {
        self.shards.prune();
    }

    /// Visits every resident entry once, shard by shard in index order.
    pub fn apply_to_all<F>(&self, f: F)
    where
        F: FnMut(&[u8], &V),
    {
        self.shards.apply_to_all(f);
    }

    /// Replaces the total budget and evicts each shard to fit its new slice.
    pub fn set_capacity(&self, capacity: u64) {
        self.shards.set_capacity(capacity);
    }

    /// Snapshot of the summed charges across shards.
    pub fn total_charge(&self) -> u64 {
        self.shards.total_charge()
    }

    /// Number of resident entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an id no other call on this cache has returned or will return.
    pub fn new_id(&self) -> u64 {
        self.shards.new_id()
    }

    fn shard_of(&self, handle: &CacheHandle) -> &parking_lot::Mutex<crate::shard::Shard<V>> {
        assert!(
            (handle.shard as usize) < self.shards.shard_count(),
            "handle does not belong to this cache"
        );
        self.shards.shard_at(handle.shard as usize)
    }
}

impl<V> CacheMetrics for PinnedLruCache<V> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.shards.metrics_report()
    }

    fn algorithm_name(&self) -> &'static str {
        "PinnedShardedLRU"
    }
}

impl<V> core::fmt::Debug for PinnedLruCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinnedLruCache")
            .field("shard_count", &self.shards.shard_count())
            .field("total_charge", &self.total_charge())
            .finish()
    }
}

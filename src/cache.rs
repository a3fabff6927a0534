//! Sharded cache façade with value semantics.
//!
//! [`LruCache`] multiplexes operations across `2^shard_bits` independently
//! locked shards. A key's 32-bit hash routes it: the top `shard_bits` bits
//! select the shard, leaving the low bits for the shard's bucket index.
//! Lookups return clones of the cached payload; the cache keeps the only
//! long-lived reference to every entry, so eviction can always proceed. For
//! lookups that pin entries in place, see [`PinnedLruCache`](crate::PinnedLruCache).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::handle::Deleter;
use crate::hash::hash_key;
use crate::metrics::{self, CacheMetrics, ShardMetrics};
use crate::shard::Shard;

/// Shared fan-out layer: the shard array, hash routing, and the process-wide
/// id counter. Both cache façades are thin wrappers around one of these.
pub(crate) struct ShardSet<V> {
    shards: Box<[Mutex<Shard<V>>]>,
    shard_bits: u32,
    next_id: AtomicU64,
}

impl<V> ShardSet<V> {
    pub fn new(config: CacheConfig) -> Self {
        let shard_bits = config.shard_bits();
        let num_shards = 1u32 << shard_bits;
        // Round the per-shard budget up so the shards jointly cover the
        // requested capacity.
        let per_shard = config.capacity().div_ceil(u64::from(num_shards));
        let shards: Vec<_> = (0..num_shards)
            .map(|_| Mutex::new(Shard::new(per_shard)))
            .collect();
        ShardSet {
            shards: shards.into_boxed_slice(),
            shard_bits,
            next_id: AtomicU64::new(1),
        }
    }

    /// Index of the shard responsible for `hash`: its top `shard_bits` bits.
    #[inline]
    pub fn shard_index(&self, hash: u32) -> usize {
        if self.shard_bits > 0 {
            (hash >> (32 - self.shard_bits)) as usize
        } else {
            0
        }
    }

    #[inline]
    pub fn shard_for(&self, hash: u32) -> &Mutex<Shard<V>> {
        &self.shards[self.shard_index(hash)]
    }

    #[inline]
    pub fn shard_at(&self, index: usize) -> &Mutex<Shard<V>> {
        &self.shards[index]
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns a fresh id, strictly increasing for the life of the cache.
    pub fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Snapshot of the summed shard usages. Each shard is locked briefly in
    /// turn, so the total can be stale under concurrent mutation.
    pub fn total_charge(&self) -> u64 {
        self.shards.iter().map(|shard| shard.lock().usage()).sum()
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().len() as usize)
            .sum()
    }

    /// Per-shard usage snapshot, in shard-index order.
    pub fn shard_charges(&self) -> Vec<u64> {
        self.shards.iter().map(|shard| shard.lock().usage()).collect()
    }

    /// Cross-shard operations lock shards one at a time in index order, so
    /// they cannot deadlock against each other.
    pub fn prune(&self) {
        for shard in self.shards.iter() {
            shard.lock().prune();
        }
    }

    pub fn set_capacity(&self, capacity: u64) {
        let per_shard = capacity.div_ceil(self.shards.len() as u64);
        for shard in self.shards.iter() {
            shard.lock().set_capacity(per_shard);
        }
    }

    pub fn apply_to_all<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &V),
    {
        for shard in self.shards.iter() {
            shard.lock().apply_all(&mut f);
        }
    }

    pub fn metrics_report(&self) -> BTreeMap<String, f64> {
        let mut total = ShardMetrics::default();
        let mut charge = 0;
        let mut capacity = 0;
        for shard in self.shards.iter() {
            let shard = shard.lock();
            shard.metrics().accumulate(&mut total);
            charge += shard.usage();
            capacity += shard.capacity();
        }
        metrics::report(&total, charge, capacity)
    }
}

/// A concurrent, sharded, charge-bounded LRU cache.
///
/// Every entry carries a caller-declared `charge`; each shard evicts from its
/// cold end whenever its summed charge exceeds its slice of the budget.
/// Lookups clone the payload out under the shard lock, so values are
/// typically cheap-to-clone types (`Arc<T>`, small byte strings, integers).
///
/// # Examples
///
/// ```
/// use sharded_lru::{CacheConfig, LruCache};
///
/// let cache: LruCache<String> = LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(1));
/// cache.put(b"k", "v".to_string());
/// assert_eq!(cache.get(b"k").as_deref(), Some("v"));
/// assert_eq!(cache.total_charge(), 2);
/// ```
pub struct LruCache<V> {
    shards: ShardSet<V>,
}

impl<V> LruCache<V> {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        LruCache {
            shards: ShardSet::new(config),
        }
    }

    /// Inserts an entry with an explicit charge and an optional destruction
    /// hook. Replaces any existing entry for the key ("latest wins"); the
    /// replaced entry's deleter fires exactly once.
    ///
    /// Fails only when the cache was built with zero capacity, in which case
    /// the deleter has already fired by the time the error is returned.
    pub fn insert(
        &self,
        key: &[u8],
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
    ) -> Result<()> {
        let hash = hash_key(key);
        self.shards
            .shard_for(hash)
            .lock()
            .insert_value(key, hash, value, charge, deleter)
    }

    /// Returns a clone of the value cached under `key`, refreshing its
    /// recency. Misses leave the cache untouched.
    pub fn lookup(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        let hash = hash_key(key);
        self.shards.shard_for(hash).lock().get(key, hash)
    }

    /// Removes the entry for `key` and returns its value. The entry's
    /// deleter fires before the value is handed back.
    pub fn remove(&self, key: &[u8]) -> Option<V> {
        let hash = hash_key(key);
        self.shards.shard_for(hash).lock().remove(key, hash)
    }

    /// Atomically replaces the entry for `key` with a value computed from the
    /// existing one, all under the shard lock.
    ///
    /// `merge_fn` receives the prior value (if any) and the argument value;
    /// `charge_fn` receives the argument value, the prior entry's charge (0
    /// when absent), and the argument charge, and yields the merged entry's
    /// charge. Returns the prior value for the caller to observe.
    pub fn merge<M, C>(
        &self,
        key: &[u8],
        value: V,
        charge: u64,
        merge_fn: M,
        charge_fn: C,
    ) -> Result<Option<V>>
    where
        V: Clone,
        M: FnOnce(Option<&V>, V) -> V,
        C: FnOnce(&V, u64, u64) -> u64,
    {
        let hash = hash_key(key);
        self.shards
            .shard_for(hash)
            .lock()
            .merge(key, hash, value, charge, merge_fn, charge_fn)
    }

    /// Visits every resident entry once, shard by shard in index order.
    /// Entries inserted or removed on other shards while the visit is in
    /// flight may or may not be seen.
    pub fn apply_to_all<F>(&self, f: F)
    where
        F: FnMut(&[u8], &V),
    {
        self.shards.apply_to_all(f);
    }

    /// Evicts every evictable entry.
    pub fn prune(&self) {
        self.shards.prune();
    }

    /// Replaces the total budget and immediately evicts each shard to fit
    /// its new slice.
    pub fn set_capacity(&self, capacity: u64) {
        self.shards.set_capacity(capacity);
    }

    /// Snapshot of the summed charges across shards; may be stale under
    /// concurrent mutation.
    pub fn total_charge(&self) -> u64 {
        self.shards.total_charge()
    }

    /// Number of resident entries across all shards (a snapshot, like
    /// [`total_charge`](Self::total_charge)).
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Per-shard usage snapshot, in shard-index order. Useful for checking
    /// how evenly a workload's keys spread across shards.
    pub fn shard_charges(&self) -> Vec<u64> {
        self.shards.shard_charges()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an id no other call on this cache has returned or will
    /// return. Callers use these to tag cache contents from independent
    /// sources so their keys cannot collide.
    pub fn new_id(&self) -> u64 {
        self.shards.new_id()
    }
}

impl<V: AsRef<[u8]>> LruCache<V> {
    /// Inserts with the conventional byte charge (key length plus value
    /// length) and no destruction hook. A rejected insert on a disabled
    /// cache is silently dropped, matching the fire-and-forget contract.
    pub fn put(&self, key: &[u8], value: V) {
        let charge = (key.len() + value.as_ref().len()) as u64;
        let _ = self.insert(key, value, charge, None);
    }

    /// Lookup alias in the byte-payload convenience API.
    pub fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        self.lookup(key)
    }

    /// Removes `key`, returning the previous value if it was resident.
    pub fn delete(&self, key: &[u8]) -> Option<V> {
        self.remove(key)
    }
}

impl<V> CacheMetrics for LruCache<V> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.shards.metrics_report()
    }

    fn algorithm_name(&self) -> &'static str {
        "ShardedLRU"
    }
}

impl<V> core::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LruCache")
            .field("shard_count", &self.shards.shard_count())
            .field("total_charge", &self.total_charge())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn byte_cache(capacity: u64, shard_bits: u32) -> LruCache<String> {
        LruCache::new(CacheConfig::new(capacity).with_shard_bits(shard_bits))
    }

    #[test]
    fn test_put_get_delete() {
        let cache = byte_cache(1024 * 1024, 1);
        cache.put(b"k", "v".to_string());
        assert_eq!(cache.get(b"k").as_deref(), Some("v"));
        assert_eq!(cache.total_charge(), 2);
        assert_eq!(cache.delete(b"k").as_deref(), Some("v"));
        assert_eq!(cache.get(b"k"), None);
        assert_eq!(cache.total_charge(), 0);
    }

    #[test]
    fn test_insert_remove_roundtrip() {
        let cache = byte_cache(1024, 0);
        cache.insert(b"a", "payload".to_string(), 64, None).unwrap();
        assert_eq!(cache.total_charge(), 64);
        assert_eq!(cache.remove(b"a").as_deref(), Some("payload"));
        assert_eq!(cache.total_charge(), 0);
        assert_eq!(cache.remove(b"a"), None);
    }

    #[test]
    fn test_disabled_cache_rejects_everything() {
        let fired = Arc::new(AtomicU64::new(0));
        let cache: LruCache<String> = byte_cache(0, 1);
        for i in 0..10u32 {
            let counter = Arc::clone(&fired);
            let deleter: Deleter<String> = Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let result = cache.insert(&i.to_be_bytes(), "v".to_string(), 1, Some(deleter));
            assert!(result.is_err());
            assert_eq!(cache.total_charge(), 0);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_routing_spreads_keys() {
        let cache = byte_cache(1024 * 1024, 3);
        for i in 0..1000u32 {
            cache.put(&i.to_be_bytes(), format!("value{i}"));
        }
        assert_eq!(cache.len(), 1000);
        for i in 0..1000u32 {
            assert!(cache.get(&i.to_be_bytes()).is_some());
        }
    }

    #[test]
    fn test_new_id_is_monotonic() {
        let cache = byte_cache(1024, 1);
        let mut last = cache.new_id();
        for _ in 0..100 {
            let id = cache.new_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_prune_then_apply_sees_nothing() {
        let cache = byte_cache(1024 * 1024, 2);
        for i in 0..50u32 {
            cache.put(&i.to_be_bytes(), "v".to_string());
        }
        cache.prune();
        assert_eq!(cache.total_charge(), 0);
        let mut visited = 0;
        cache.apply_to_all(|_, _| visited += 1);
        assert_eq!(visited, 0);
        // Pruning an empty cache is a no-op.
        cache.prune();
        assert_eq!(cache.total_charge(), 0);
    }

    #[test]
    fn test_set_capacity_shrinks_resident_set() {
        let cache = byte_cache(1000, 0);
        for i in 0..10u32 {
            cache.insert(&i.to_be_bytes(), "v".to_string(), 100, None).unwrap();
        }
        assert_eq!(cache.total_charge(), 1000);

        cache.set_capacity(300);
        assert!(cache.total_charge() <= 300);
        // The newest entries are the survivors.
        assert!(cache.get(&9u32.to_be_bytes()).is_some());
        assert_eq!(cache.get(&0u32.to_be_bytes()), None);
    }

    #[test]
    fn test_metrics_aggregate_across_shards() {
        let cache = byte_cache(1024 * 1024, 2);
        cache.put(b"a", "1".to_string());
        cache.put(b"b", "2".to_string());
        assert!(cache.get(b"a").is_some());
        assert!(cache.get(b"missing").is_none());

        let metrics = cache.metrics();
        assert_eq!(metrics.get("requests"), Some(&2.0));
        assert_eq!(metrics.get("cache_hits"), Some(&1.0));
        assert_eq!(metrics.get("cache_misses"), Some(&1.0));
        assert_eq!(metrics.get("insertions"), Some(&2.0));
        assert_eq!(cache.algorithm_name(), "ShardedLRU");
    }
}

//! Single-shard LRU engine.
//!
//! A shard owns an arena of entry slots, two circular intrusive lists
//! threaded through them, and a chained hash index:
//!
//! - the **recency list** holds entries only the cache references; the
//!   sentinel's `next` is the oldest entry (the eviction target), its `prev`
//!   the newest;
//! - the **in-use list** parks entries with outstanding caller references,
//!   keeping them out of the eviction scan entirely.
//!
//! Every entry carries a reference count that includes the cache's own
//! reference while the entry is indexed. The last reference to go frees the
//! slot and fires the entry's deleter. All methods assume the caller holds
//! the shard's mutex (the façades in [`crate::cache`] and [`crate::pinned`]
//! wrap each shard in one).

use crate::error::{Error, Result};
use crate::handle::{Deleter, Handle, Slot, NIL};
use crate::metrics::ShardMetrics;
use crate::table::HandleTable;

/// Arena index of the recency-list sentinel.
const LRU: u32 = 0;
/// Arena index of the in-use-list sentinel.
const IN_USE: u32 = 1;

/// One independently locked slice of the cache.
pub(crate) struct Shard<V> {
    capacity: u64,
    usage: u64,
    slots: Vec<Slot<V>>,
    /// Head of the free-slot list, linked through `Slot::next`.
    free: u32,
    table: HandleTable,
    metrics: ShardMetrics,
}

impl<V> Shard<V> {
    pub fn new(capacity: u64) -> Self {
        Shard {
            capacity,
            usage: 0,
            slots: vec![Slot::sentinel(LRU), Slot::sentinel(IN_USE)],
            free: NIL,
            table: HandleTable::new(),
            metrics: ShardMetrics::default(),
        }
    }

    /// Sum of charges across resident entries.
    #[inline]
    pub fn usage(&self) -> u64 {
        self.usage
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> u32 {
        self.table.len()
    }

    #[inline]
    pub fn metrics(&self) -> &ShardMetrics {
        &self.metrics
    }

    /// Updates the budget and immediately evicts down to it.
    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        self.evict_to_fit();
    }

    // ---- intrusive list plumbing -------------------------------------------

    fn list_remove(&mut self, e: u32) {
        let (prev, next) = {
            let slot = &self.slots[e as usize];
            (slot.prev, slot.next)
        };
        self.slots[next as usize].prev = prev;
        self.slots[prev as usize].next = next;
    }

    /// Makes `e` the newest entry of the list headed by the sentinel `list`.
    fn list_append(&mut self, list: u32, e: u32) {
        let last = self.slots[list as usize].prev;
        {
            let slot = &mut self.slots[e as usize];
            slot.next = list;
            slot.prev = last;
        }
        self.slots[last as usize].next = e;
        self.slots[list as usize].prev = e;
    }

    // ---- slot arena --------------------------------------------------------

    fn alloc_slot(&mut self, handle: Handle<V>) -> u32 {
        if self.free != NIL {
            let index = self.free;
            self.free = self.slots[index as usize].next;
            let slot = &mut self.slots[index as usize];
            slot.handle = Some(handle);
            slot.prev = NIL;
            slot.next = NIL;
            slot.chain = NIL;
            return index;
        }
        let index = u32::try_from(self.slots.len()).expect("shard slot arena overflow");
        assert!(index < NIL, "shard slot arena overflow");
        self.slots.push(Slot::occupied(handle));
        index
    }

    fn free_slot(&mut self, index: u32) -> Handle<V> {
        let slot = &mut self.slots[index as usize];
        let handle = slot.handle.take().expect("freeing an empty slot");
        slot.generation = slot.generation.wrapping_add(1);
        slot.chain = NIL;
        slot.prev = NIL;
        slot.next = self.free;
        self.free = index;
        handle
    }

    #[inline]
    fn handle(&self, e: u32) -> &Handle<V> {
        self.slots[e as usize]
            .handle
            .as_ref()
            .expect("listed slot without an entry")
    }

    #[inline]
    fn handle_mut(&mut self, e: u32) -> &mut Handle<V> {
        self.slots[e as usize]
            .handle
            .as_mut()
            .expect("listed slot without an entry")
    }

    // ---- reference counting ------------------------------------------------

    /// Adds a caller reference. A cached entry still on the recency list
    /// migrates to the in-use list, whatever its current count.
    fn pin(&mut self, e: u32) {
        let migrate = {
            let handle = self.handle(e);
            handle.in_cache && !handle.on_in_use
        };
        if migrate {
            self.list_remove(e);
            self.list_append(IN_USE, e);
            self.handle_mut(e).on_in_use = true;
        }
        self.handle_mut(e).refs += 1;
    }

    /// Drops one reference. The last reference frees the slot, fires the
    /// deleter, and yields the value. An entry left holding only the cache's
    /// reference returns from the in-use list to the newest end of the
    /// recency list.
    fn unref(&mut self, e: u32) -> Option<V> {
        let refs = self.handle(e).refs;
        assert!(refs > 0, "entry reference count underflow");
        if refs == 1 {
            assert!(
                !self.handle(e).in_cache,
                "dropped the last reference to an entry still in the cache"
            );
            let handle = self.free_slot(e);
            handle.fire_deleter();
            return Some(handle.value);
        }

        let re_park = {
            let handle = self.handle_mut(e);
            handle.refs -= 1;
            handle.refs == 1 && handle.in_cache && handle.on_in_use
        };
        if re_park {
            self.handle_mut(e).on_in_use = false;
            self.list_remove(e);
            self.list_append(LRU, e);
        }
        None
    }

    /// Completes removal of an entry that has already left the hash index:
    /// off whichever list holds it, charge subtracted, cache reference
    /// dropped. Returns the value when that was the last reference.
    fn finish_erase(&mut self, e: u32) -> Option<V> {
        let charge = {
            let handle = self.handle_mut(e);
            assert!(handle.in_cache, "erasing an entry that is not cached");
            handle.in_cache = false;
            handle.on_in_use = false;
            handle.charge
        };
        self.list_remove(e);
        self.usage = self
            .usage
            .checked_sub(charge)
            .expect("shard usage underflow");
        self.unref(e)
    }

    // ---- eviction ----------------------------------------------------------

    /// Retires the entry at the cold end of the recency list. A pinned entry
    /// found there is migrated to the in-use list and the scan continues.
    /// Returns `false` once the recency list is empty.
    fn evict_oldest(&mut self) -> bool {
        loop {
            let victim = self.slots[LRU as usize].next;
            if victim == LRU {
                return false;
            }
            if self.handle(victim).refs > 1 {
                self.list_remove(victim);
                self.list_append(IN_USE, victim);
                self.handle_mut(victim).on_in_use = true;
                continue;
            }
            self.table.remove_index(&mut self.slots, victim);
            let freed = self.finish_erase(victim);
            debug_assert!(freed.is_some(), "cold entry had outstanding references");
            self.metrics.record_eviction();
            return true;
        }
    }

    fn evict_to_fit(&mut self) {
        while self.usage > self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    /// Evicts every evictable entry. Pinned entries survive.
    pub fn prune(&mut self) {
        while self.evict_oldest() {}
    }

    // ---- insertion ---------------------------------------------------------

    /// Inserts an entry, displacing any existing entry for the same key.
    ///
    /// With `pin`, the new entry starts with a caller reference and is parked
    /// on the in-use list; otherwise the cache holds the only reference and
    /// the entry joins the newest end of the recency list (where the eviction
    /// pass triggered by this very insertion may reclaim it).
    fn insert_entry(
        &mut self,
        key: &[u8],
        hash: u32,
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
        pin: bool,
    ) -> Result<u32> {
        if self.capacity == 0 {
            // Rejected entries still run their destruction hook exactly once.
            if let Some(deleter) = &deleter {
                deleter(key, &value);
            }
            return Err(Error::CacheDisabled);
        }

        let handle = Handle {
            key: key.into(),
            value,
            charge,
            hash,
            deleter,
            refs: if pin { 2 } else { 1 },
            in_cache: true,
            on_in_use: pin,
        };
        let e = self.alloc_slot(handle);
        self.list_append(if pin { IN_USE } else { LRU }, e);
        self.usage += charge;
        self.metrics.record_insertion();

        if let Some(old) = self.table.insert(&mut self.slots, e) {
            self.finish_erase(old);
        }
        self.evict_to_fit();
        Ok(e)
    }

    /// Insertion for the value-returning façade: the cache keeps the only
    /// reference.
    pub fn insert_value(
        &mut self,
        key: &[u8],
        hash: u32,
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
    ) -> Result<()> {
        self.insert_entry(key, hash, value, charge, deleter, false)
            .map(|_| ())
    }

    /// Insertion for the pinning façade: returns `(slot, generation)` for the
    /// caller's token. The pinned entry cannot be evicted by the insertion's
    /// own eviction pass, so the returned slot is live.
    pub fn insert_pinned(
        &mut self,
        key: &[u8],
        hash: u32,
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
    ) -> Result<(u32, u32)> {
        let e = self.insert_entry(key, hash, value, charge, deleter, true)?;
        Ok((e, self.slots[e as usize].generation))
    }

    // ---- lookups -----------------------------------------------------------

    /// Value-returning lookup: a hit is spliced to the newest end of the
    /// recency list and its value cloned out; a miss touches nothing.
    pub fn get(&mut self, key: &[u8], hash: u32) -> Option<V>
    where
        V: Clone,
    {
        match self.table.lookup(&self.slots, key, hash) {
            Some(e) => {
                self.metrics.record_hit();
                self.list_remove(e);
                self.list_append(LRU, e);
                Some(self.handle(e).value.clone())
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Pinning lookup: a hit gains a caller reference and moves to the in-use
    /// list. Returns `(slot, generation)` for the token.
    pub fn lookup(&mut self, key: &[u8], hash: u32) -> Option<(u32, u32)> {
        match self.table.lookup(&self.slots, key, hash) {
            Some(e) => {
                self.metrics.record_hit();
                self.pin(e);
                Some((e, self.slots[e as usize].generation))
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Pins without touching recency: the entry keeps its current list
    /// position. If eviction pressure reaches it while pinned, the scan
    /// migrates it to the in-use list instead of evicting it.
    pub fn reference(&mut self, key: &[u8], hash: u32) -> Option<(u32, u32)> {
        match self.table.lookup(&self.slots, key, hash) {
            Some(e) => {
                self.metrics.record_hit();
                self.handle_mut(e).refs += 1;
                Some((e, self.slots[e as usize].generation))
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Validates a token and drops its reference.
    ///
    /// Panics on a slot/generation pair the shard does not recognise: a token
    /// that was already released, double-released, or minted elsewhere.
    pub fn release(&mut self, slot: u32, generation: u32) {
        assert!(
            self.token_is_live(slot, generation),
            "released a handle the cache does not know about"
        );
        self.unref(slot);
    }

    /// Reads the entry behind a live token without affecting recency.
    pub fn with_value<R>(&self, slot: u32, generation: u32, f: impl FnOnce(&[u8], &V) -> R) -> R {
        assert!(
            self.token_is_live(slot, generation),
            "dereferenced a handle the cache does not know about"
        );
        let handle = self.handle(slot);
        f(&handle.key, &handle.value)
    }

    fn token_is_live(&self, slot: u32, generation: u32) -> bool {
        (slot as usize) < self.slots.len()
            && self.slots[slot as usize].generation == generation
            && self.slots[slot as usize].handle.is_some()
    }

    // ---- removal -----------------------------------------------------------

    /// Unlinks `(hash, key)` and returns its value once the last reference is
    /// gone (immediately, in the value façade). The deleter fires when the
    /// value is handed back.
    pub fn remove(&mut self, key: &[u8], hash: u32) -> Option<V> {
        let e = self.table.remove(&mut self.slots, key, hash)?;
        self.finish_erase(e)
    }

    /// Unlinks `(hash, key)`. Pinners keep the orphaned entry alive until
    /// their last release.
    pub fn erase(&mut self, key: &[u8], hash: u32) {
        if let Some(e) = self.table.remove(&mut self.slots, key, hash) {
            self.finish_erase(e);
        }
    }

    // ---- merge -------------------------------------------------------------

    /// Atomic read-modify-write under the shard lock. `merge_fn` builds the
    /// new value from the existing one (if any); `charge_fn` receives the
    /// inserted value, the replaced entry's charge (0 when absent), and the
    /// caller's charge. The replaced entry keeps its exactly-once deleter
    /// guarantee; its hook is re-attached to the merged entry.
    pub fn merge<M, C>(
        &mut self,
        key: &[u8],
        hash: u32,
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
        let prior = self.table.lookup(&self.slots, key, hash).map(|e| {
            let handle = self.handle(e);
            (handle.value.clone(), handle.charge, handle.deleter.clone())
        });
        let (prior_value, prior_charge, deleter) = match prior {
            Some((value, charge, deleter)) => (Some(value), charge, deleter),
            None => (None, 0, None),
        };

        let new_charge = charge_fn(&value, prior_charge, charge);
        let new_value = merge_fn(prior_value.as_ref(), value);
        self.insert_value(key, hash, new_value, new_charge, deleter)?;
        Ok(prior_value)
    }

    // ---- whole-shard visits ------------------------------------------------

    /// Visits every resident entry once, in hash-index order.
    pub fn apply_all<F>(&self, f: &mut F)
    where
        F: FnMut(&[u8], &V),
    {
        for bucket in 0..self.table.bucket_count() {
            let mut e = self.table.bucket_head(bucket);
            while e != NIL {
                let slot = &self.slots[e as usize];
                let handle = slot.handle.as_ref().expect("chained slot without an entry");
                f(&handle.key, &handle.value);
                e = slot.chain;
            }
        }
    }
}

impl<V> Drop for Shard<V> {
    /// Flushes the destruction hook of every entry still alive in the arena,
    /// resident or orphaned, preserving the exactly-once guarantee at cache
    /// teardown.
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(handle) = slot.handle.take() {
                handle.fire_deleter();
            }
        }
    }
}

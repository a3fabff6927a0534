//! Hash index over arena slots.
//!
//! Open hashing with per-bucket chains threaded through the slots' `chain`
//! links. Chaining is used rather than open addressing because entries are
//! pinned to stable slot indices by the intrusive recency lists; probe-
//! sequence rearrangement would invalidate those links.
//!
//! The table grows itself so the load factor stays at or below one, and the
//! rehash cross-checks its relink count against the element count, aborting
//! on drift.

use crate::handle::{Slot, NIL};

/// Smallest bucket array; always a power of two.
const MIN_BUCKETS: usize = 16;

/// Chained hash index mapping `(hash, key)` to the arena slot holding the
/// matching entry.
pub(crate) struct HandleTable {
    buckets: Vec<u32>,
    elems: u32,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable {
            buckets: vec![NIL; MIN_BUCKETS],
            elems: 0,
        }
    }

    /// Number of entries currently indexed.
    #[inline]
    pub fn len(&self) -> u32 {
        self.elems
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Head of the given bucket's chain, `NIL` when empty.
    #[inline]
    pub fn bucket_head(&self, bucket: usize) -> u32 {
        self.buckets[bucket]
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// Walks the chain for `(hash, key)` and returns `(predecessor, match)`,
    /// either of which may be `NIL`.
    fn find<V>(&self, slots: &[Slot<V>], key: &[u8], hash: u32) -> (u32, u32) {
        let mut prev = NIL;
        let mut cur = self.buckets[self.bucket_of(hash)];
        while cur != NIL {
            let handle = slots[cur as usize]
                .handle
                .as_ref()
                .expect("chained slot without an entry");
            if handle.hash == hash && handle.key.as_ref() == key {
                break;
            }
            prev = cur;
            cur = slots[cur as usize].chain;
        }
        (prev, cur)
    }

    /// Returns the slot holding `(hash, key)`, if any.
    pub fn lookup<V>(&self, slots: &[Slot<V>], key: &[u8], hash: u32) -> Option<u32> {
        let (_, cur) = self.find(slots, key, hash);
        (cur != NIL).then_some(cur)
    }

    /// Links the occupied slot `index` into the table.
    ///
    /// If an entry with the same key is already indexed, the new slot takes
    /// over its chain position and the displaced slot is returned for the
    /// shard to retire. Fresh entries become the head of their chain.
    pub fn insert<V>(&mut self, slots: &mut [Slot<V>], index: u32) -> Option<u32> {
        let (prev, old, hash) = {
            let probe = slots[index as usize]
                .handle
                .as_ref()
                .expect("inserting an empty slot");
            let (prev, old) = self.find(slots, &probe.key, probe.hash);
            (prev, old, probe.hash)
        };

        if old != NIL {
            slots[index as usize].chain = slots[old as usize].chain;
            if prev == NIL {
                let bucket = self.bucket_of(hash);
                self.buckets[bucket] = index;
            } else {
                slots[prev as usize].chain = index;
            }
            slots[old as usize].chain = NIL;
            return Some(old);
        }

        let bucket = self.bucket_of(hash);
        slots[index as usize].chain = self.buckets[bucket];
        self.buckets[bucket] = index;
        self.elems += 1;
        if self.elems as usize > self.buckets.len() {
            self.resize(slots);
        }
        None
    }

    /// Unlinks and returns the slot holding `(hash, key)`, if any.
    pub fn remove<V>(&mut self, slots: &mut [Slot<V>], key: &[u8], hash: u32) -> Option<u32> {
        let (prev, cur) = self.find(slots, key, hash);
        if cur == NIL {
            return None;
        }
        self.unlink(slots, prev, cur, hash);
        Some(cur)
    }

    /// Unlinks a slot known to be indexed, located by identity rather than by
    /// key, so callers holding only the slot index need not borrow the key.
    pub fn remove_index<V>(&mut self, slots: &mut [Slot<V>], index: u32) {
        let hash = slots[index as usize]
            .handle
            .as_ref()
            .expect("removing an empty slot")
            .hash;
        let mut prev = NIL;
        let mut cur = self.buckets[self.bucket_of(hash)];
        while cur != NIL && cur != index {
            prev = cur;
            cur = slots[cur as usize].chain;
        }
        assert_eq!(cur, index, "entry missing from its hash chain");
        self.unlink(slots, prev, cur, hash);
    }

    fn unlink<V>(&mut self, slots: &mut [Slot<V>], prev: u32, cur: u32, hash: u32) {
        let next = slots[cur as usize].chain;
        if prev == NIL {
            let bucket = self.bucket_of(hash);
            self.buckets[bucket] = next;
        } else {
            slots[prev as usize].chain = next;
        }
        slots[cur as usize].chain = NIL;
        self.elems -= 1;
    }

    /// Grows the bucket array until it exceeds 1.5x the element count, then
    /// rehashes every chain. Relinked entries keep working because they are
    /// identified by slot index, not position.
    fn resize<V>(&mut self, slots: &mut [Slot<V>]) {
        let mut new_len = MIN_BUCKETS;
        while new_len * 2 < self.elems as usize * 3 {
            new_len *= 2;
        }

        let mut new_buckets = vec![NIL; new_len];
        let mut moved: u32 = 0;
        for bucket in 0..self.buckets.len() {
            let mut cur = self.buckets[bucket];
            while cur != NIL {
                let next = slots[cur as usize].chain;
                let hash = slots[cur as usize]
                    .handle
                    .as_ref()
                    .expect("chained slot without an entry")
                    .hash;
                let target = hash as usize & (new_len - 1);
                slots[cur as usize].chain = new_buckets[target];
                new_buckets[target] = cur;
                moved += 1;
                cur = next;
            }
        }
        assert_eq!(moved, self.elems, "hash index count drifted during resize");
        self.buckets = new_buckets;
    }
}

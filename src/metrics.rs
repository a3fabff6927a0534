//! Cache metrics.
//!
//! Each shard tracks a handful of plain counters under its own lock; the
//! cache façades aggregate them on demand. Reporting uses `BTreeMap` so
//! metric keys always come out in a deterministic order, which keeps test
//! output and log lines reproducible.

use std::collections::BTreeMap;

/// Per-shard operation counters. Updated under the shard mutex, so plain
/// integers suffice.
#[derive(Debug, Default, Clone)]
pub(crate) struct ShardMetrics {
    /// Lookups served (hits + misses).
    pub requests: u64,
    /// Lookups that found a resident entry.
    pub hits: u64,
    /// Entries accepted by insert or merge.
    pub insertions: u64,
    /// Entries retired by capacity pressure or prune.
    pub evictions: u64,
}

impl ShardMetrics {
    #[inline]
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }

    #[inline]
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    #[inline]
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    #[inline]
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Folds this shard's counters into an aggregate.
    pub fn accumulate(&self, total: &mut ShardMetrics) {
        total.requests += self.requests;
        total.hits += self.hits;
        total.insertions += self.insertions;
        total.evictions += self.evictions;
    }
}

/// Builds the deterministic metrics report from aggregated counters and the
/// current charge totals.
pub(crate) fn report(total: &ShardMetrics, total_charge: u64, capacity: u64) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();

    metrics.insert("requests".to_string(), total.requests as f64);
    metrics.insert("cache_hits".to_string(), total.hits as f64);
    metrics.insert(
        "cache_misses".to_string(),
        (total.requests - total.hits) as f64,
    );
    metrics.insert("insertions".to_string(), total.insertions as f64);
    metrics.insert("evictions".to_string(), total.evictions as f64);

    let hit_rate = if total.requests > 0 {
        total.hits as f64 / total.requests as f64
    } else {
        0.0
    };
    metrics.insert("hit_rate".to_string(), hit_rate);

    metrics.insert("total_charge".to_string(), total_charge as f64);
    metrics.insert("capacity".to_string(), capacity as f64);
    let utilization = if capacity > 0 {
        total_charge as f64 / capacity as f64
    } else {
        0.0
    };
    metrics.insert("utilization".to_string(), utilization);

    metrics
}

/// Uniform metrics interface implemented by both cache façades.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short identifier for the cache flavour (e.g. `"ShardedLRU"`).
    fn algorithm_name(&self) -> &'static str;
}

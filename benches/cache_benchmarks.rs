//! Throughput benchmarks for the sharded cache.
//!
//! Run with `cargo bench`. Covers the convenience byte API, explicit-charge
//! inserts, the merge path, and pinned lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sharded_lru::{CacheConfig, LruCache, PinnedLruCache};

const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn random_keys(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            (0..len)
                .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())])
                .collect()
        })
        .collect()
}

fn bench_put(c: &mut Criterion) {
    let cache: LruCache<String> = LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(4));
    c.bench_function("put_same_key", |b| {
        b.iter(|| cache.put(black_box(b"aaaaaaaaaa"), "aaaaaaaaaaaa".to_string()));
    });

    let keys = random_keys(10_000, 8);
    let mut next = 0;
    c.bench_function("put_random_keys", |b| {
        b.iter(|| {
            let key = &keys[next % keys.len()];
            next += 1;
            cache.put(black_box(key), "aaaaaaaaaaaaaaa".to_string());
        });
    });
}

fn bench_get(c: &mut Criterion) {
    let cache: LruCache<String> = LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(4));
    cache.put(b"aaaaaaaaaa", "aaaaaaaaaaaa".to_string());
    c.bench_function("get_hit", |b| {
        b.iter(|| black_box(cache.get(black_box(b"aaaaaaaaaa"))));
    });
    c.bench_function("get_miss", |b| {
        b.iter(|| black_box(cache.get(black_box(b"bbbbbbbbbb"))));
    });
}

fn bench_insert(c: &mut Criterion) {
    let cache: LruCache<Vec<u8>> = LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(4));
    let keys = random_keys(10_000, 8);
    let mut next = 0;
    c.bench_function("insert_fixed_charge", |b| {
        b.iter(|| {
            let key = &keys[next % keys.len()];
            next += 1;
            cache
                .insert(black_box(key), vec![0u8; 16], 1000, None)
                .unwrap();
        });
    });
}

fn bench_merge(c: &mut Criterion) {
    let cache: LruCache<u64> = LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(4));
    c.bench_function("merge_counter", |b| {
        b.iter(|| {
            sharded_lru::counter::add(&cache, black_box(b"counter"), 1);
        });
    });
}

fn bench_pinned_lookup(c: &mut Criterion) {
    let cache: PinnedLruCache<Vec<u8>> =
        PinnedLruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(4));
    let handle = cache.insert(b"hot", vec![0u8; 64], 64, None).unwrap();
    cache.release(handle);

    c.bench_function("lookup_release", |b| {
        b.iter(|| {
            let handle = cache.lookup(black_box(b"hot")).unwrap();
            let len = cache.value_with(&handle, Vec::len);
            cache.release(handle);
            black_box(len)
        });
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_insert,
    bench_merge,
    bench_pinned_lookup
);
criterion_main!(benches);

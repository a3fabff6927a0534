//! Key namespacing.
//!
//! [`NamespacedCache`] prepends a fixed byte prefix to every key before it
//! reaches the shared cache, so independent subsystems can divide one charge
//! budget without key collisions. Namespacing is an application-level
//! concern: it lives here as a wrapper rather than inside the cache core,
//! and the prefix bytes count toward each entry's conventional charge like
//! any other key bytes.

use std::sync::Arc;

use crate::cache::LruCache;
use crate::error::Result;
use crate::handle::Deleter;

/// A view of a shared [`LruCache`] under a fixed key prefix.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sharded_lru::{CacheConfig, LruCache, NamespacedCache};
///
/// let shared = Arc::new(LruCache::new(CacheConfig::new(1024 * 1024).with_shard_bits(1)));
/// let users = NamespacedCache::new(Arc::clone(&shared), b"users/");
/// let posts = NamespacedCache::new(Arc::clone(&shared), b"posts/");
///
/// users.put(b"42", "alice".to_string());
/// posts.put(b"42", "hello".to_string());
/// assert_eq!(users.get(b"42").as_deref(), Some("alice"));
/// assert_eq!(posts.get(b"42").as_deref(), Some("hello"));
/// ```
pub struct NamespacedCache<V> {
    inner: Arc<LruCache<V>>,
    prefix: Box<[u8]>,
}

impl<V> NamespacedCache<V> {
    /// Wraps `inner` so every key is prefixed with `prefix`.
    pub fn new(inner: Arc<LruCache<V>>, prefix: &[u8]) -> Self {
        NamespacedCache {
            inner,
            prefix: prefix.into(),
        }
    }

    fn scoped(&self, key: &[u8]) -> Vec<u8> {
        let mut scoped = Vec::with_capacity(self.prefix.len() + key.len());
        scoped.extend_from_slice(&self.prefix);
        scoped.extend_from_slice(key);
        scoped
    }

    /// Namespaced [`LruCache::insert`]. The charge is the caller's to pick;
    /// note that the prefixed key is what the deleter will observe.
    pub fn insert(
        &self,
        key: &[u8],
        value: V,
        charge: u64,
        deleter: Option<Deleter<V>>,
    ) -> Result<()> {
        self.inner.insert(&self.scoped(key), value, charge, deleter)
    }

    /// Namespaced [`LruCache::lookup`].
    pub fn lookup(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        self.inner.lookup(&self.scoped(key))
    }

    /// Namespaced [`LruCache::remove`].
    pub fn remove(&self, key: &[u8]) -> Option<V> {
        self.inner.remove(&self.scoped(key))
    }
}

impl<V: AsRef<[u8]>> NamespacedCache<V> {
    /// Namespaced [`LruCache::put`]; the prefix inflates the conventional
    /// charge by its length.
    pub fn put(&self, key: &[u8], value: V) {
        self.inner.put(&self.scoped(key), value);
    }

    /// Namespaced [`LruCache::get`].
    pub fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        self.inner.get(&self.scoped(key))
    }

    /// Namespaced [`LruCache::delete`].
    pub fn delete(&self, key: &[u8]) -> Option<V> {
        self.inner.delete(&self.scoped(key))
    }
}

impl<V> core::fmt::Debug for NamespacedCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NamespacedCache")
            .field("prefix", &self.prefix)
            .finish()
    }
}

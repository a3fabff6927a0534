#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Architecture
//!
//! The cache is three layers, leaves first:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     LruCache / PinnedLruCache                        │
//! │                                                                      │
//! │  hash(key) >> (32 - shard_bits)  ──▶  shard selection                │
//! │                                                                      │
//! │  ┌──────────────┐ ┌──────────────┐       ┌──────────────┐            │
//! │  │   Shard 0    │ │   Shard 1    │  ...  │  Shard N-1   │            │
//! │  │  ┌────────┐  │ │  ┌────────┐  │       │  ┌────────┐  │            │
//! │  │  │ Mutex  │  │ │  │ Mutex  │  │       │  │ Mutex  │  │            │
//! │  │  └────┬───┘  │ │  └────┬───┘  │       │  └────┬───┘  │            │
//! │  │       ▼      │ │       ▼      │       │       ▼      │            │
//! │  │ slot arena   │ │ slot arena   │       │ slot arena   │            │
//! │  │ recency list │ │ recency list │       │ recency list │            │
//! │  │ in-use list  │ │ in-use list  │       │ in-use list  │            │
//! │  │ hash index   │ │ hash index   │       │ hash index   │            │
//! │  └──────────────┘ └──────────────┘       └──────────────┘            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Every shard owns an arena of entry slots. The recency list, the in-use
//!   list, and the hash-bucket chains are all threaded through those slots as
//!   dense `u32` indices, so the intrusive structures need no raw pointers.
//! - The hash index uses chaining so entries keep a stable slot for their
//!   whole residency; the index resizes itself to hold its load factor at or
//!   below one.
//! - The recency list sentinel's `next` is the oldest entry, the eviction
//!   target. Entries pinned by callers sit on the in-use list instead, out
//!   of the eviction scan's reach.
//!
//! # Choosing a façade
//!
//! | | [`LruCache`] | [`PinnedLruCache`] |
//! |---|---|---|
//! | lookup returns | cloned value | [`CacheHandle`] token |
//! | eviction | always possible | pinned entries exempt |
//! | caller obligation | none | must `release` every handle |
//! | suited to | cheap-to-clone payloads | zero-copy access, borrow-across-calls |
//!
//! # Modules
//!
//! - [`config`]: capacity and shard-count configuration
//! - [`metrics`]: per-cache operation counters
//! - [`counter`]: u64 counter helpers over the merge protocol
//! - [`namespace`]: key-prefix views of a shared cache

/// Cache configuration structures.
pub mod config;

/// Cache error types.
pub mod error;

/// Cache metrics reporting.
pub mod metrics;

/// Integer counter helpers built on the generic merge protocol.
pub mod counter;

/// Key-prefix wrapper for sharing one cache between subsystems.
pub mod namespace;

mod cache;
mod handle;
mod hash;
mod pinned;
mod shard;
mod table;

pub use cache::LruCache;
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use handle::Deleter;
pub use metrics::CacheMetrics;
pub use namespace::NamespacedCache;
pub use pinned::{CacheHandle, PinnedLruCache};

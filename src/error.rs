//! Cache error types.

use thiserror::Error;

/// Errors surfaced by cache operations.
///
/// Absent keys are not errors: the lookup-family operations report them as
/// `None`. Internal consistency violations (hash-index count drift, reference
/// underflow, releasing an unknown handle) are programmer errors and panic
/// instead of surfacing here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The cache was constructed with zero capacity, so the insertion was
    /// rejected. The entry's deleter has already fired by the time this is
    /// returned; the cache took ownership of nothing.
    #[error("cache is disabled (capacity is 0)")]
    CacheDisabled,
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

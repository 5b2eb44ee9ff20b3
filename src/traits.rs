//! # Compute-and-Cache Traits
//!
//! This module defines the seams between the CAR cache and its users.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────┐        ┌──────────────────────────────────┐
//!   │     ValueComputer<K, V>      │        │        ComputeCache<K, V>        │
//!   │                              │        │                                  │
//!   │  type Error                  │◄───────│  compute(K) → Result<V, Error>   │
//!   │  compute(&K) → Result<V,     │ calls  │  remove(&K) → bool               │
//!   │     ComputeError<V, Error>>  │ on miss│  clear()                         │
//!   │                              │        │  release_matching(pred) → usize  │
//!   │  blanket impl for closures   │        │  clear_stale_references() → usize│
//!   └──────────────────────────────┘        │  len / key_count / hit_rate      │
//!                                           └──────────────────────────────────┘
//!                                                    ▲               ▲
//!                                                    │               │
//!                                            CarCache<K,V,C>  ShardedCarCache<K,V,C>
//! ```
//!
//! Consumers that only need "compute once, reuse afterwards" (descriptor
//! resolution, scope lookups, reflective metadata) program against
//! [`ComputeCache`] and stay agnostic of the eviction policy and of sharding.
//!
//! ## Trait Summary
//!
//! | Trait             | Purpose                                         |
//! |-------------------|-------------------------------------------------|
//! | `ValueComputer`   | Produces values on cache misses                 |
//! | `ComputeCache`    | Generic compute-and-cache contract              |
//! | `ConcurrentCache` | Marker: `Send + Sync` cache usable across threads |

use crate::error::ComputeError;

/// Produces the value for a key on a cache miss.
///
/// Returning [`ComputeError::Uncacheable`] hands a value back to the caller
/// without admitting it; [`ComputeError::Failed`] aborts the `compute` call
/// with `Self::Error`.
///
/// Closures of the shape `Fn(&K) -> Result<V, ComputeError<V, E>>` implement
/// this trait automatically.
///
/// # Example
///
/// ```
/// use carcache::error::ComputeError;
/// use carcache::traits::ValueComputer;
///
/// struct Square;
///
/// impl ValueComputer<u32, u64> for Square {
///     type Error = std::convert::Infallible;
///
///     fn compute(&self, key: &u32) -> Result<u64, ComputeError<u64, Self::Error>> {
///         Ok(u64::from(*key) * u64::from(*key))
///     }
/// }
///
/// assert_eq!(Square.compute(&12), Ok(144));
/// ```
pub trait ValueComputer<K, V> {
    /// Hard failure type propagated to `compute` callers.
    type Error;

    /// Computes the value for `key`.
    fn compute(&self, key: &K) -> Result<V, ComputeError<V, Self::Error>>;
}

impl<K, V, E, F> ValueComputer<K, V> for F
where
    F: Fn(&K) -> Result<V, ComputeError<V, E>>,
{
    type Error = E;

    #[inline]
    fn compute(&self, key: &K) -> Result<V, ComputeError<V, E>> {
        self(key)
    }
}

/// Generic compute-and-cache contract.
///
/// # Example
///
/// ```
/// use carcache::error::ComputeError;
/// use carcache::policy::car::CarCache;
/// use carcache::traits::ComputeCache;
///
/// fn warm<C: ComputeCache<u32, String>>(cache: &C, keys: &[u32]) {
///     for &k in keys {
///         let _ = cache.compute(k);
///     }
/// }
///
/// let cache = CarCache::new(
///     |k: &u32| Ok::<_, ComputeError<String, ()>>(format!("v{k}")),
///     16,
///     false,
/// );
/// warm(&cache, &[1, 2, 3]);
/// assert_eq!(ComputeCache::len(&cache), 3);
/// ```
pub trait ComputeCache<K, V> {
    /// Hard failure type of the underlying computation.
    type Error;

    /// Returns the cached value for `key`, computing and admitting it on a miss.
    fn compute(&self, key: K) -> Result<V, Self::Error>;

    /// Removes `key` from every internal structure. Returns `true` if
    /// anything was removed.
    fn remove(&self, key: &K) -> bool;

    /// Drops all entries and statistics.
    fn clear(&self);

    /// Removes every key satisfying `pred`; returns the number removed.
    fn release_matching<P>(&self, pred: P) -> usize
    where
        P: FnMut(&K) -> bool;

    /// Purges keys that are no longer live; returns the number removed.
    fn clear_stale_references(&self) -> usize;

    /// Number of cached values.
    fn len(&self) -> usize;

    /// Returns `true` if no values are cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tracked identities (cached values plus ghost entries).
    fn key_count(&self) -> usize;

    /// Percentage of `compute` calls served from the cache, `0.0..=100.0`.
    fn hit_rate(&self) -> f64;
}

/// Marker trait for caches that are safe to share across threads.
pub trait ConcurrentCache: Send + Sync {}

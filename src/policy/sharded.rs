//! Hash-sharded CAR cache.
//!
//! Splits the key space over `N` independent [`CarCache`] instances. Each
//! shard owns its admission mutex, its state lock and its own `p`, so a slow
//! computation only serializes misses that hash to the same shard. The global
//! hit rate is usually a little lower than a single cache of the same total
//! size because adaptation happens per shard.
//!
//! ```text
//!   compute(k) ──► ShardSelector(seed, k) ──► shard i ──► CarCache::compute
//!
//!   ┌──────────────┬──────────────┬──────────────┬──────────────┐
//!   │ CarCache #0  │ CarCache #1  │ CarCache #2  │ CarCache #3  │
//!   │ max = ⌈m/4⌉  │ max = ⌈m/4⌉  │ max = ⌊m/4⌋  │ max = ⌊m/4⌋  │
//!   └──────────────┴──────────────┴──────────────┴──────────────┘
//!            all shards call the same Arc'd computation
//! ```
//!
//! ## Example
//!
//! ```
//! use carcache::error::ComputeError;
//! use carcache::policy::sharded::ShardedCarCache;
//!
//! let cache = ShardedCarCache::new(
//!     |k: &u64| Ok::<_, ComputeError<u64, ()>>(k * k),
//!     64,
//!     4,
//!     false,
//! );
//! assert_eq!(cache.compute(9), Ok(81));
//! assert_eq!(cache.shard_count(), 4);
//! assert_eq!(cache.max_size(), 64);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::ds::{Liveness, ShardSelector};
use crate::error::{ComputeError, ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::{CarMetricsSnapshot, MetricsSnapshotProvider};
use crate::policy::car::{CarCache, DEFAULT_NAME};
use crate::traits::{ComputeCache, ConcurrentCache, ValueComputer};

/// Computation shared by every shard.
#[derive(Debug)]
struct SharedComputer<C>(Arc<C>);

impl<K, V, C> ValueComputer<K, V> for SharedComputer<C>
where
    C: ValueComputer<K, V>,
{
    type Error = C::Error;

    #[inline]
    fn compute(&self, key: &K) -> Result<V, ComputeError<V, Self::Error>> {
        self.0.compute(key)
    }
}

/// Per-shard statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShardStats {
    pub len: usize,
    pub key_count: usize,
    pub p: usize,
    pub max_size: usize,
    pub hit_rate: f64,
}

/// CAR cache partitioned by key hash.
pub struct ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    shards: Box<[CarCache<K, V, SharedComputer<C>>]>,
    selector: ShardSelector,
    max_size: usize,
}

impl<K, V, C> ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone + Liveness,
    V: Clone,
    C: ValueComputer<K, V>,
{
    /// Creates a sharded cache holding at most `max_size` values in total.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is zero or `max_size < shards`.
    pub fn new(computer: C, max_size: usize, shards: usize, weak_keys: bool) -> Self {
        match Self::try_new(computer, max_size, shards, weak_keys) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid sharded CAR configuration: {err}"),
        }
    }

    /// Fallible constructor using seed 0.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `shards` is zero or `max_size < shards`
    /// (every shard needs room for at least one value).
    pub fn try_new(
        computer: C,
        max_size: usize,
        shards: usize,
        weak_keys: bool,
    ) -> Result<Self, ConfigError> {
        Self::try_named(computer, max_size, shards, 0, weak_keys, DEFAULT_NAME)
    }

    pub(crate) fn try_named(
        computer: C,
        max_size: usize,
        shards: usize,
        seed: u64,
        weak_keys: bool,
        name: &str,
    ) -> Result<Self, ConfigError> {
        if shards == 0 {
            return Err(ConfigError::new("shards must be greater than zero"));
        }
        if max_size < shards {
            return Err(ConfigError::new(format!(
                "max_size ({max_size}) must be at least the shard count ({shards})"
            )));
        }

        let computer = Arc::new(computer);
        let base = max_size / shards;
        let extra = max_size % shards;
        let shards = (0..shards)
            .map(|i| {
                let shard_max = base + usize::from(i < extra);
                CarCache::try_named(
                    SharedComputer(Arc::clone(&computer)),
                    shard_max,
                    weak_keys,
                    Arc::from(format!("{name}#{i}")),
                )
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();

        Ok(Self {
            selector: ShardSelector::new(shards.len(), seed),
            shards,
            max_size,
        })
    }

    #[inline]
    fn shard(&self, key: &K) -> &CarCache<K, V, SharedComputer<C>> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    /// Returns the cached value for `key`, computing it in the owning shard
    /// on a miss.
    ///
    /// # Errors
    ///
    /// Returns the computation's error on [`ComputeError::Failed`].
    pub fn compute(&self, key: K) -> Result<V, C::Error> {
        self.shard(&key).compute(key)
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.shard(key).peek(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).contains(key)
    }

    pub fn remove(&self, key: &K) -> bool {
        self.shard(key).remove(key)
    }

    /// Clears every shard. Shards are cleared one after another, so
    /// concurrent computes may repopulate earlier shards before the call
    /// returns.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }

    pub fn release_matching<P>(&self, mut pred: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        self.shards
            .iter()
            .map(|shard| shard.release_matching(&mut pred))
            .sum()
    }

    pub fn clear_stale_references(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.clear_stale_references())
            .sum()
    }

    /// Checks every shard, reporting the first failure with its index.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantError`] prefixed with the shard index.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (i, shard) in self.shards.iter().enumerate() {
            shard
                .check_invariants()
                .map_err(|err| InvariantError::new(format!("shard {i}: {err}")))?;
        }
        Ok(())
    }
}

impl<K, V, C> ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Total capacity across shards.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    pub fn key_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.key_count()).sum()
    }

    /// Hit rate over all shards, weighted by calls.
    pub fn hit_rate(&self) -> f64 {
        let (hits, tries) = self
            .shards
            .iter()
            .map(|shard| shard.hit_counts())
            .fold((0, 0), |(h, t), (sh, st)| (h + sh, t + st));
        if tries == 0 {
            return 0.0;
        }
        hits as f64 * 100.0 / tries as f64
    }

    /// Statistics for each shard, in shard order.
    pub fn shard_stats(&self) -> Vec<ShardStats> {
        self.shards
            .iter()
            .map(|shard| ShardStats {
                len: shard.len(),
                key_count: shard.key_count(),
                p: shard.p(),
                max_size: shard.max_size(),
                hit_rate: shard.hit_rate(),
            })
            .collect()
    }
}

impl<K, V, C> fmt::Debug for ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCarCache")
            .field("shards", &self.shards.len())
            .field("seed", &self.selector.seed())
            .field("max_size", &self.max_size)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl<K, V, C> MetricsSnapshotProvider<CarMetricsSnapshot> for ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    /// Merged snapshot; gauges are sums over shards.
    fn snapshot(&self) -> CarMetricsSnapshot {
        let mut total = CarMetricsSnapshot::default();
        for shard in self.shards.iter() {
            total.merge(&shard.snapshot());
        }
        total
    }
}

impl<K, V, C> ComputeCache<K, V> for ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone + Liveness,
    V: Clone,
    C: ValueComputer<K, V>,
{
    type Error = C::Error;

    fn compute(&self, key: K) -> Result<V, Self::Error> {
        ShardedCarCache::compute(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        ShardedCarCache::remove(self, key)
    }

    fn clear(&self) {
        ShardedCarCache::clear(self)
    }

    fn release_matching<P>(&self, pred: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        ShardedCarCache::release_matching(self, pred)
    }

    fn clear_stale_references(&self) -> usize {
        ShardedCarCache::clear_stale_references(self)
    }

    fn len(&self) -> usize {
        ShardedCarCache::len(self)
    }

    fn key_count(&self) -> usize {
        ShardedCarCache::key_count(self)
    }

    fn hit_rate(&self) -> f64 {
        ShardedCarCache::hit_rate(self)
    }
}

impl<K, V, C> ConcurrentCache for ShardedCarCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
    C: Send + Sync,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    type Computer = fn(&u64) -> Result<u64, ComputeError<u64, Infallible>>;

    fn plus_one(key: &u64) -> Result<u64, ComputeError<u64, Infallible>> {
        Ok(key + 1)
    }

    #[test]
    fn capacity_is_split_across_shards() {
        let cache = ShardedCarCache::new(plus_one as Computer, 10, 4, false);
        let stats = cache.shard_stats();
        let sizes: Vec<usize> = stats.iter().map(|s| s.max_size).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(cache.max_size(), 10);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let err = ShardedCarCache::try_new(plus_one as Computer, 8, 0, false).unwrap_err();
        assert!(err.message().contains("shards"));
        let err = ShardedCarCache::try_new(plus_one as Computer, 2, 4, false).unwrap_err();
        assert!(err.message().contains("max_size"));
    }

    #[test]
    fn keys_stay_in_their_shard() {
        let cache = ShardedCarCache::new(plus_one as Computer, 128, 4, false);
        for key in 0..32 {
            assert_eq!(cache.compute(key), Ok(key + 1));
        }
        for key in 0..32 {
            assert!(cache.contains(&key));
            assert_eq!(cache.peek(&key), Some(key + 1));
        }
        assert_eq!(cache.len(), 32);
        assert_eq!(cache.shard_stats().iter().map(|s| s.len).sum::<usize>(), 32);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn computation_is_shared_not_cloned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = ShardedCarCache::new(
            move |k: &u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ComputeError<u64, Infallible>>(*k)
            },
            64,
            4,
            false,
        );
        for key in 0..16 {
            cache.compute(key).unwrap();
            cache.compute(key).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 16);
        assert_eq!(cache.hit_rate(), 50.0);
    }

    #[test]
    fn bulk_operations_cover_all_shards() {
        let cache = ShardedCarCache::new(plus_one as Computer, 320, 8, false);
        for key in 0..40 {
            cache.compute(key).unwrap();
        }
        assert_eq!(cache.release_matching(|k| k % 2 == 0), 20);
        assert_eq!(cache.len(), 20);
        assert!(cache.remove(&1));
        assert!(!cache.remove(&1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.key_count(), 0);
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn concurrent_computes_respect_capacity() {
        let cache = Arc::new(ShardedCarCache::new(plus_one as Computer, 40, 4, false));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = (i * 7 + t) % 120;
                        assert_eq!(cache.compute(key), Ok(key + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 40);
        cache.check_invariants().unwrap();
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn snapshot_merges_shards() {
        let cache = ShardedCarCache::new(plus_one as Computer, 16, 2, false);
        for key in 0..8 {
            cache.compute(key).unwrap();
        }
        let snap = cache.snapshot();
        assert_eq!(snap.tries, 8);
        assert_eq!(snap.misses, 8);
        assert_eq!(snap.len(), 8);
        assert_eq!(snap.max_size, 16);
    }
}

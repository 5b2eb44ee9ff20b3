//! Concurrent Clock with Adaptive Replacement (CAR) compute cache.
//!
//! Implements CAR (Bansal & Modha, FAST 2004) behind a compute-and-cache
//! contract: callers ask for a key, the cache either returns the stored value
//! or runs the configured [`ValueComputer`] and admits the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          CarCache<K, V, C> Layout                           │
//! │                                                                             │
//! │   admission: Mutex<()>          single exclusive section per instance       │
//! │   state:     RwLock<CarState>   shared for hits, exclusive for mutation     │
//! │   hits / tries: AtomicU64       relaxed, approximate                        │
//! │                                                                             │
//! │   ┌─────────────────────────────────────────────────────────────────────┐   │
//! │   │ CarState                                                            │   │
//! │   │                                                                     │   │
//! │   │   T1: ClockList (seen once)        T2: ClockList (seen again)       │   │
//! │   │   ┌──► A ──► B ──► C ──┐           ┌──► X ──► Y ──┐                 │   │
//! │   │   └────────────────────┘           └──────────────┘                 │   │
//! │   │     ref=0 → key to B1                ref=0 → key to B2              │   │
//! │   │     ref=1 → move to T2               ref=1 → clear bit, advance     │   │
//! │   │                                                                     │   │
//! │   │   B1: OrderedEvictionSet           B2: OrderedEvictionSet           │   │
//! │   │   (ghosts evicted from T1)         (ghosts evicted from T2)         │   │
//! │   │                                                                     │   │
//! │   │   p: target size of T1, 0..=max_size                                │   │
//! │   └─────────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Compute Flow
//!
//! ```text
//!   compute(k)
//!     │
//!     ├─ state.read(): T1 hit? T2 hit? ── yes ──► set ref bit, return clone
//!     │
//!     ├─ admission.lock()
//!     ├─ state.read(): re-probe ───────── yes ──► set ref bit, return clone
//!     │
//!     ├─ computer.compute(&k)
//!     │     Uncacheable(v) ──► return Ok(v), nothing admitted
//!     │     Failed(e)      ──► return Err(e), nothing admitted
//!     │
//!     └─ state.write():
//!           if |T1|+|T2| >= max_size: replace(), trim ghosts
//!           k in B1 → p grows,  k into T2
//!           k in B2 → p shrinks, k into T2
//!           otherwise           k into T1
//! ```
//!
//! ## Operations
//!
//! | Operation                | Locks                  | Notes                          |
//! |--------------------------|------------------------|--------------------------------|
//! | `compute` (hit)          | state (shared)         | Atomic reference-bit store     |
//! | `compute` (miss)         | admission, then state  | Computation runs outside state |
//! | `peek` / `contains`      | state (shared)         | No counters, no reference bit  |
//! | `remove` / `clear`       | admission, then state  |                                |
//! | `release_matching`       | admission, then state  | Predicate runs under the lock  |
//! | `clear_stale_references` | admission, then state  | No-op with strong keys         |
//!
//! ## Thread Safety
//!
//! [`CarCache`] is `Send + Sync` when `K`, `V` and `C` are. The computation
//! runs while the admission mutex is held, so a slow computation for one key
//! serializes every miss on the instance. Hits keep flowing because they only
//! need the shared state lock. Use
//! [`ShardedCarCache`](crate::policy::sharded::ShardedCarCache) to spread
//! misses over independent instances.
//!
//! ## Example Usage
//!
//! ```
//! use carcache::error::ComputeError;
//! use carcache::policy::car::CarCache;
//!
//! let cache = CarCache::new(
//!     |name: &String| Ok::<_, ComputeError<usize, ()>>(name.len()),
//!     128,
//!     false,
//! );
//!
//! assert_eq!(cache.compute("hello".to_string()), Ok(5));
//! assert_eq!(cache.compute("hello".to_string()), Ok(5));
//! assert_eq!(cache.hit_rate(), 50.0);
//! assert_eq!(cache.t1_len(), 1);
//! ```
//!
//! ## References
//!
//! - Bansal & Modha, "CAR: Clock with Adaptive Replacement", FAST 2004

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::ds::{ClockList, Liveness, OrderedEvictionSet};
use crate::error::{ComputeError, ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::{
    CarMetrics, CarMetricsRecorder, CarMetricsSnapshot, CoreMetricsRecorder, MetricsReset,
    MetricsSnapshotProvider,
};
use crate::traits::{ComputeCache, ConcurrentCache, ValueComputer};

/// Name carried by tracing events when none is configured.
pub const DEFAULT_NAME: &str = "car";

/// Lists, ghosts and the adaptive target. Guarded by `CarCache::state`.
struct CarState<K, V> {
    t1: ClockList<K, V>,
    t2: ClockList<K, V>,
    b1: OrderedEvictionSet<K>,
    b2: OrderedEvictionSet<K>,
    p: usize,
    max_size: usize,
    weak_keys: bool,
    name: Arc<str>,
    #[cfg(feature = "metrics")]
    metrics: Arc<CarMetrics>,
}

impl<K, V> CarState<K, V>
where
    K: Eq + Hash + Clone + Liveness,
{
    #[inline]
    fn value_count(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    #[inline]
    fn key_count(&self) -> usize {
        self.value_count() + self.b1.len() + self.b2.len()
    }

    #[inline]
    fn is_dead(&self, key: &K) -> bool {
        self.weak_keys && !key.is_live()
    }

    /// Probes T1 then T2, setting the reference bit on a match.
    #[inline]
    fn probe(&self, key: &K) -> Option<&V> {
        self.t1.get_marked(key).or_else(|| self.t2.get_marked(key))
    }

    /// Admits a freshly computed value.
    fn admit(&mut self, key: K, value: V) {
        let in_b1 = self.b1.contains(&key);
        let in_b2 = !in_b1 && self.b2.contains(&key);

        if self.value_count() >= self.max_size {
            self.replace();
            if !in_b1 && !in_b2 {
                self.trim_ghosts();
            }
        }

        if in_b1 {
            self.grow_target();
            self.b1.remove(&key);
            self.t2.put(key, value);
        } else if in_b2 {
            self.shrink_target();
            self.b2.remove(&key);
            self.t2.put(key, value);
        } else {
            self.t1.put(key, value);
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_admission();

        debug_assert!(self.value_count() <= self.max_size);
        debug_assert!(self.key_count() <= 2 * self.max_size);
    }

    /// Evicts exactly one entry from T1 ∪ T2.
    ///
    /// Dead keys (weak mode only) leave without a ghost.
    fn replace(&mut self) {
        let target = self.p.max(1);
        loop {
            let from_t1 = if self.t1.len() >= target {
                true
            } else if !self.t2.is_empty() {
                false
            } else if !self.t1.is_empty() {
                true
            } else {
                return;
            };

            if from_t1 {
                let Some((key, _, referenced)) = self.t1.current() else {
                    return;
                };
                let key = key.clone();
                if self.is_dead(&key) {
                    self.t1.remove(&key);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_stale_eviction();
                    debug!(cache = %self.name, list = "t1", "dropped stale entry");
                    return;
                }
                if !referenced {
                    self.t1.remove(&key);
                    self.b1.add(key);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_t1_eviction();
                    debug!(cache = %self.name, b1 = self.b1.len(), "evicted T1 entry to B1");
                    return;
                }
                if let Some(value) = self.t1.remove(&key) {
                    self.t2.put(key, value);
                }
                #[cfg(feature = "metrics")]
                self.metrics.record_t1_to_t2_demotion();
                debug!(cache = %self.name, t2 = self.t2.len(), "moved referenced T1 entry to T2");
            } else {
                let Some((key, _, referenced)) = self.t2.current() else {
                    return;
                };
                let key = key.clone();
                if self.is_dead(&key) {
                    self.t2.remove(&key);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_stale_eviction();
                    debug!(cache = %self.name, list = "t2", "dropped stale entry");
                    return;
                }
                if !referenced {
                    self.t2.remove(&key);
                    self.b2.add(key);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_t2_eviction();
                    debug!(cache = %self.name, b2 = self.b2.len(), "evicted T2 entry to B2");
                    return;
                }
                self.t2.clear_reference(&key);
                self.t2.next();
                #[cfg(feature = "metrics")]
                self.metrics.record_hand_sweep();
            }
        }
    }

    /// Keeps the directory bounded after a replacement for a brand-new key.
    fn trim_ghosts(&mut self) {
        if self.t1.len() + self.b1.len() > self.max_size {
            let trimmed = self.b1.pop_oldest();
            debug_assert!(trimmed.is_some(), "B1 trim on an empty ghost list");
            if trimmed.is_some() {
                #[cfg(feature = "metrics")]
                self.metrics.record_ghost_trim();
                debug!(cache = %self.name, list = "b1", "trimmed oldest ghost");
            }
        } else if self.key_count() >= 2 * self.max_size {
            let trimmed = self.b2.pop_oldest();
            debug_assert!(trimmed.is_some(), "B2 trim on an empty ghost list");
            if trimmed.is_some() {
                #[cfg(feature = "metrics")]
                self.metrics.record_ghost_trim();
                debug!(cache = %self.name, list = "b2", "trimmed oldest ghost");
            }
        }
    }

    /// B1 hit: favour recency.
    fn grow_target(&mut self) {
        // Weak-key purges can empty a ghost list between calls.
        let delta = self.b2.len().div_ceil(self.b1.len().max(1)).max(1);
        let before = self.p;
        self.p = (self.p + delta).min(self.max_size);

        #[cfg(feature = "metrics")]
        {
            self.metrics.record_ghost_recent_hit();
            if self.p != before {
                self.metrics.record_target_increase();
            }
        }
        debug!(cache = %self.name, from = before, to = self.p, "ghost hit in B1");
    }

    /// B2 hit: favour frequency.
    fn shrink_target(&mut self) {
        let delta = self.b1.len().div_ceil(self.b2.len().max(1)).max(1);
        let before = self.p;
        self.p = self.p.saturating_sub(delta);

        #[cfg(feature = "metrics")]
        {
            self.metrics.record_ghost_frequent_hit();
            if self.p != before {
                self.metrics.record_target_decrease();
            }
        }
        debug!(cache = %self.name, from = before, to = self.p, "ghost hit in B2");
    }

    fn remove(&mut self, key: &K) -> bool {
        self.t1.remove(key).is_some()
            || self.t2.remove(key).is_some()
            || self.b1.remove(key)
            || self.b2.remove(key)
    }

    fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }

    fn release_matching<P>(&mut self, mut pred: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        self.t1.release_matching(&mut pred)
            + self.t2.release_matching(&mut pred)
            + self.b1.release_matching(&mut pred)
            + self.b2.release_matching(&mut pred)
    }

    fn clear_stale_references(&mut self) -> usize {
        self.t1.clear_stale_references()
            + self.t2.clear_stale_references()
            + self.b1.clear_stale_references()
            + self.b2.clear_stale_references()
    }

    fn dump(&self) -> CarDump<K> {
        CarDump {
            t1: self.t1.iter().map(|(k, _, _)| k.clone()).collect(),
            t2: self.t2.iter().map(|(k, _, _)| k.clone()).collect(),
            b1: self.b1.iter().cloned().collect(),
            b2: self.b2.iter().cloned().collect(),
            p: self.p,
            max_size: self.max_size,
        }
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.value_count() > self.max_size {
            return Err(InvariantError::new(format!(
                "T1 + T2 holds {} values, max_size is {}",
                self.value_count(),
                self.max_size
            )));
        }
        if self.p > self.max_size {
            return Err(InvariantError::new(format!(
                "p is {}, max_size is {}",
                self.p, self.max_size
            )));
        }
        if self.key_count() > 2 * self.max_size {
            return Err(InvariantError::new(format!(
                "{} tracked keys exceed twice max_size ({})",
                self.key_count(),
                self.max_size
            )));
        }
        for (key, _, _) in self.t1.iter() {
            if self.t2.contains(key) || self.b1.contains(key) || self.b2.contains(key) {
                return Err(InvariantError::new("key in T1 is tracked by another list"));
            }
        }
        for (key, _, _) in self.t2.iter() {
            if self.b1.contains(key) || self.b2.contains(key) {
                return Err(InvariantError::new("key in T2 is tracked by a ghost list"));
            }
        }
        if self.b1.iter().any(|key| self.b2.contains(key)) {
            return Err(InvariantError::new("key is in both B1 and B2"));
        }
        Ok(())
    }

    #[cfg(test)]
    fn debug_validate_invariants(&self) {
        self.t1.debug_validate_invariants();
        self.t2.debug_validate_invariants();
        self.b1.debug_validate_invariants();
        self.b2.debug_validate_invariants();
        if let Err(err) = self.check_invariants() {
            panic!("CAR invariant violated: {err}");
        }
    }
}

/// Concurrent CAR compute cache.
///
/// See the [module documentation](self) for the locking model.
///
/// # Type Parameters
///
/// - `K`: key; `Eq + Hash + Clone + Liveness`
/// - `V`: value; cloned out on every hit
/// - `C`: the [`ValueComputer`] run on misses
///
/// # Example
///
/// ```
/// use carcache::error::ComputeError;
/// use carcache::policy::car::CarCache;
///
/// let cache = CarCache::new(|k: &u32| Ok::<_, ComputeError<u32, ()>>(k * 2), 2, false);
/// cache.compute(1).unwrap();
/// cache.compute(2).unwrap();
/// cache.compute(3).unwrap();
///
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.b1_len(), 1);
/// ```
pub struct CarCache<K, V, C> {
    state: RwLock<CarState<K, V>>,
    admission: Mutex<()>,
    computer: C,
    max_size: usize,
    weak_keys: bool,
    name: Arc<str>,
    hits: AtomicU64,
    tries: AtomicU64,
    #[cfg(feature = "metrics")]
    metrics: Arc<CarMetrics>,
}

impl<K, V, C> CarCache<K, V, C>
where
    K: Eq + Hash + Clone + Liveness,
    V: Clone,
    C: ValueComputer<K, V>,
{
    /// Creates a cache holding at most `max_size` values.
    ///
    /// With `weak_keys` the cache consults [`Liveness::is_live`] to drop keys
    /// whose referent is gone.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero. Use [`try_new`](Self::try_new) for a
    /// fallible constructor.
    pub fn new(computer: C, max_size: usize, weak_keys: bool) -> Self {
        match Self::try_new(computer, max_size, weak_keys) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid CAR configuration: {err}"),
        }
    }

    /// Fallible constructor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_size` is zero.
    pub fn try_new(computer: C, max_size: usize, weak_keys: bool) -> Result<Self, ConfigError> {
        Self::try_named(computer, max_size, weak_keys, Arc::from(DEFAULT_NAME))
    }

    pub(crate) fn try_named(
        computer: C,
        max_size: usize,
        weak_keys: bool,
        name: Arc<str>,
    ) -> Result<Self, ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::new("max_size must be greater than zero"));
        }

        #[cfg(feature = "metrics")]
        let metrics = Arc::new(CarMetrics::new());

        let state = CarState {
            t1: ClockList::new(),
            t2: ClockList::new(),
            b1: OrderedEvictionSet::new(),
            b2: OrderedEvictionSet::new(),
            p: 0,
            max_size,
            weak_keys,
            name: Arc::clone(&name),
            #[cfg(feature = "metrics")]
            metrics: Arc::clone(&metrics),
        };

        Ok(Self {
            state: RwLock::new(state),
            admission: Mutex::new(()),
            computer,
            max_size,
            weak_keys,
            name,
            hits: AtomicU64::new(0),
            tries: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            metrics,
        })
    }

    /// Returns the cached value for `key`, computing and admitting it on a
    /// miss.
    ///
    /// # Errors
    ///
    /// Returns the computation's error when it reports
    /// [`ComputeError::Failed`]. Nothing is admitted in that case.
    pub fn compute(&self, key: K) -> Result<V, C::Error> {
        self.tries.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = self.state.read().probe(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(cache = %self.name, "hit");
            return Ok(value);
        }

        let _admission = self.admission.lock();

        if let Some(value) = self.state.read().probe(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(cache = %self.name, "hit after admission wait");
            return Ok(value);
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_miss();
        trace!(cache = %self.name, "miss");

        let value = match self.computer.compute(&key) {
            Ok(value) => value,
            Err(ComputeError::Uncacheable(value)) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_uncacheable();
                trace!(cache = %self.name, "computed value is not cacheable");
                return Ok(value);
            },
            Err(ComputeError::Failed(err)) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_compute_failure();
                trace!(cache = %self.name, "computation failed");
                return Err(err);
            },
        };

        self.state.write().admit(key, value.clone());
        Ok(value)
    }

    /// Returns a clone of the cached value without touching counters or the
    /// reference bit.
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = self.state.read();
        state.t1.get(key).or_else(|| state.t2.get(key)).cloned()
    }

    /// Returns `true` if a value for `key` is cached. Ghost entries do not
    /// count.
    pub fn contains(&self, key: &K) -> bool {
        let state = self.state.read();
        state.t1.contains(key) || state.t2.contains(key)
    }

    /// Removes `key` from whichever list holds it.
    pub fn remove(&self, key: &K) -> bool {
        let _admission = self.admission.lock();
        self.state.write().remove(key)
    }

    /// Empties all lists, resets `p` and the statistics.
    pub fn clear(&self) {
        let _admission = self.admission.lock();
        self.state.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.tries.store(0, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        {
            self.metrics.reset_metrics();
            self.metrics.record_clear();
        }
        debug!(cache = %self.name, "cleared");
    }

    /// Removes every key, cached or ghost, for which `pred` returns `true`.
    ///
    /// Returns the number of keys removed. `pred` runs under the cache lock
    /// and must not call back into this cache.
    pub fn release_matching<P>(&self, pred: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let _admission = self.admission.lock();
        let released = self.state.write().release_matching(pred);
        #[cfg(feature = "metrics")]
        self.metrics.record_released(released);
        debug!(cache = %self.name, released, "released matching keys");
        released
    }

    /// Drops every key whose referent is gone. Always 0 with strong keys.
    pub fn clear_stale_references(&self) -> usize {
        if !self.weak_keys {
            return 0;
        }
        let _admission = self.admission.lock();
        let purged = self.state.write().clear_stale_references();
        #[cfg(feature = "metrics")]
        self.metrics.record_stale_purged(purged);
        if purged > 0 {
            debug!(cache = %self.name, purged, "purged stale references");
        }
        purged
    }

    /// Copies the key order of all four lists, for debugging.
    pub fn dump(&self) -> CarDump<K> {
        self.state.read().dump()
    }

    /// Verifies the CAR invariants against the current state.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantError`] naming the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.state.read().check_invariants()
    }
}

impl<K, V, C> CarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    /// Number of cached values (`|T1| + |T2|`).
    pub fn len(&self) -> usize {
        let state = self.state.read();
        state.t1.len() + state.t2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tracked keys across T1, T2, B1 and B2.
    pub fn key_count(&self) -> usize {
        let state = self.state.read();
        state.t1.len() + state.t2.len() + state.b1.len() + state.b2.len()
    }

    /// Percentage of `compute` calls served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let tries = self.tries.load(Ordering::Relaxed);
        if tries == 0 {
            return 0.0;
        }
        self.hits.load(Ordering::Relaxed) as f64 * 100.0 / tries as f64
    }

    pub fn t1_len(&self) -> usize {
        self.state.read().t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.state.read().t2.len()
    }

    pub fn b1_len(&self) -> usize {
        self.state.read().b1.len()
    }

    pub fn b2_len(&self) -> usize {
        self.state.read().b2.len()
    }

    /// Current target size of T1.
    pub fn p(&self) -> usize {
        self.state.read().p
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn weak_keys(&self) -> bool {
        self.weak_keys
    }

    /// Name attached to this cache's tracing events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(hits, tries)` as currently recorded.
    #[cfg(feature = "concurrency")]
    pub(crate) fn hit_counts(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.tries.load(Ordering::Relaxed),
        )
    }
}

impl<K, V, C> fmt::Debug for CarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CarCache")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("weak_keys", &self.weak_keys)
            .field("t1_len", &state.t1.len())
            .field("t2_len", &state.t2.len())
            .field("b1_len", &state.b1.len())
            .field("b2_len", &state.b2.len())
            .field("p", &state.p)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl<K, V, C> MetricsSnapshotProvider<CarMetricsSnapshot> for CarCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn snapshot(&self) -> CarMetricsSnapshot {
        let state = self.state.read();
        CarMetricsSnapshot {
            tries: self.tries.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            t1_len: state.t1.len(),
            t2_len: state.t2.len(),
            b1_len: state.b1.len(),
            b2_len: state.b2.len(),
            p: state.p,
            max_size: self.max_size,
            ..self.metrics.snapshot()
        }
    }
}

impl<K, V, C> ComputeCache<K, V> for CarCache<K, V, C>
where
    K: Eq + Hash + Clone + Liveness,
    V: Clone,
    C: ValueComputer<K, V>,
{
    type Error = C::Error;

    fn compute(&self, key: K) -> Result<V, Self::Error> {
        CarCache::compute(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        CarCache::remove(self, key)
    }

    fn clear(&self) {
        CarCache::clear(self)
    }

    fn release_matching<P>(&self, pred: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        CarCache::release_matching(self, pred)
    }

    fn clear_stale_references(&self) -> usize {
        CarCache::clear_stale_references(self)
    }

    fn len(&self) -> usize {
        CarCache::len(self)
    }

    fn key_count(&self) -> usize {
        CarCache::key_count(self)
    }

    fn hit_rate(&self) -> f64 {
        CarCache::hit_rate(self)
    }
}

impl<K, V, C> ConcurrentCache for CarCache<K, V, C>
where
    K: Send + Sync,
    V: Send + Sync,
    C: Send + Sync,
{
}

/// Key order of the four CAR lists at one instant.
///
/// T1 and T2 are listed in clock order starting at the hand; B1 and B2
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarDump<K> {
    pub t1: Vec<K>,
    pub t2: Vec<K>,
    pub b1: Vec<K>,
    pub b2: Vec<K>,
    pub p: usize,
    pub max_size: usize,
}

impl<K: fmt::Debug> fmt::Display for CarDump<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p={} max_size={}", self.p, self.max_size)?;
        writeln!(f, "T1: {:?}", self.t1)?;
        writeln!(f, "T2: {:?}", self.t2)?;
        writeln!(f, "B1: {:?}", self.b1)?;
        write!(f, "B2: {:?}", self.b2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::WeakKey;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    type Computer = fn(&u32) -> Result<u32, ComputeError<u32, Infallible>>;

    fn times_ten(key: &u32) -> Result<u32, ComputeError<u32, Infallible>> {
        Ok(key * 10)
    }

    fn cache(max_size: usize) -> CarCache<u32, u32, Computer> {
        CarCache::new(times_ten as Computer, max_size, false)
    }

    fn letters(
        max_size: usize,
    ) -> CarCache<&'static str, String, impl ValueComputer<&'static str, String, Error = Infallible>>
    {
        CarCache::new(
            |k: &&'static str| Ok::<_, ComputeError<String, Infallible>>(k.to_lowercase()),
            max_size,
            false,
        )
    }

    #[test]
    fn car_new_cache_is_empty() {
        let cache = cache(8);
        assert!(cache.is_empty());
        assert_eq!(cache.key_count(), 0);
        assert_eq!(cache.p(), 0);
        assert_eq!(cache.max_size(), 8);
        assert!(!cache.weak_keys());
        assert_eq!(cache.name(), DEFAULT_NAME);
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn car_zero_capacity_rejected() {
        let err = CarCache::try_new(times_ten as Computer, 0, false).unwrap_err();
        assert!(err.message().contains("max_size"));
    }

    #[test]
    #[should_panic(expected = "max_size")]
    fn car_zero_capacity_panics_in_new() {
        let _ = cache(0);
    }

    #[test]
    fn car_hit_after_insert_skips_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = CarCache::new(
            move |k: &u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ComputeError<u32, Infallible>>(k + 1)
            },
            4,
            false,
        );

        assert_eq!(cache.compute(7), Ok(8));
        assert_eq!(cache.compute(7), Ok(8));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hit_rate(), 50.0);
    }

    #[test]
    fn car_hit_sets_reference_bit_only() {
        let cache = cache(4);
        cache.compute(1).unwrap();
        cache.compute(1).unwrap();
        assert_eq!(cache.t1_len(), 1);
        assert_eq!(cache.t2_len(), 0);
        assert!(cache.state.read().t1.is_referenced(&1).unwrap());
    }

    #[test]
    fn car_scenario_capacity_two() {
        let cache = letters(2);

        cache.compute("A").unwrap();
        cache.compute("B").unwrap();
        let dump = cache.dump();
        assert_eq!(dump.t1, vec!["A", "B"]);
        assert_eq!(cache.p(), 0);

        cache.compute("C").unwrap();
        let dump = cache.dump();
        assert_eq!(dump.t1, vec!["B", "C"]);
        assert_eq!(dump.b1, vec!["A"]);

        assert_eq!(cache.compute("A"), Ok("a".to_string()));
        let dump = cache.dump();
        assert_eq!(dump.t1, vec!["C"]);
        assert_eq!(dump.t2, vec!["A"]);
        assert_eq!(dump.b1, vec!["B"]);
        assert!(dump.b2.is_empty());
        assert_eq!(dump.p, 1);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn car_ghost_rereference_moves_key_to_t2() {
        let cache = cache(4);
        for key in 0..5 {
            cache.compute(key).unwrap();
        }
        assert_eq!(cache.dump().b1, vec![0]);
        let p_before = cache.p();

        cache.compute(0).unwrap();
        assert!(cache.p() > p_before);
        assert_eq!(cache.dump().t2, vec![0]);
        assert!(!cache.dump().t1.contains(&0));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn car_referenced_t1_entry_is_moved_not_evicted() {
        let cache = letters(2);
        cache.compute("A").unwrap();
        cache.compute("B").unwrap();
        cache.compute("A").unwrap();

        cache.compute("C").unwrap();
        let dump = cache.dump();
        assert_eq!(dump.t1, vec!["C"]);
        assert_eq!(dump.t2, vec!["A"]);
        assert_eq!(dump.b1, vec!["B"]);
    }

    #[test]
    fn car_ghost_hit_in_b2_shrinks_target() {
        let cache = letters(2);
        cache.compute("A").unwrap();
        cache.compute("B").unwrap();
        cache.compute("A").unwrap();
        cache.compute("B").unwrap();

        // Both referenced: both move to T2, then A leaves T2 for B2.
        cache.compute("C").unwrap();
        let dump = cache.dump();
        assert_eq!(dump.t1, vec!["C"]);
        assert_eq!(dump.t2, vec!["B"]);
        assert_eq!(dump.b2, vec!["A"]);

        cache.compute("D").unwrap();
        assert_eq!(cache.dump().b1, vec!["C"]);

        cache.compute("C").unwrap();
        assert_eq!(cache.p(), 1);
        let dump = cache.dump();
        assert!(dump.t1.is_empty());
        assert_eq!(dump.t2, vec!["B", "C"]);
        assert_eq!(dump.b1, vec!["D"]);

        cache.compute("A").unwrap();
        let dump = cache.dump();
        assert_eq!(cache.p(), 0);
        assert_eq!(dump.t2, vec!["C", "A"]);
        assert_eq!(dump.b2, vec!["B"]);
        assert_eq!(dump.b1, vec!["D"]);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn car_uncacheable_result_is_returned_but_not_admitted() {
        let cache = CarCache::new(
            |k: &u32| {
                if k % 2 == 0 {
                    Err(ComputeError::<u32, Infallible>::Uncacheable(0))
                } else {
                    Ok(*k)
                }
            },
            2,
            false,
        );
        cache.compute(1).unwrap();
        cache.compute(3).unwrap();
        let before = cache.dump();

        assert_eq!(cache.compute(4), Ok(0));
        assert_eq!(cache.dump(), before);
        assert!(!cache.contains(&4));
    }

    #[test]
    fn car_failed_computation_propagates_without_mutation() {
        let cache = CarCache::new(
            |k: &u32| {
                if *k == 13 {
                    Err(ComputeError::Failed(format!("unlucky {k}")))
                } else {
                    Ok(*k)
                }
            },
            2,
            false,
        );
        cache.compute(1).unwrap();
        cache.compute(2).unwrap();
        let before = cache.dump();

        assert_eq!(cache.compute(13), Err("unlucky 13".to_string()));
        assert_eq!(cache.dump(), before);
        assert_eq!(cache.key_count(), 2);
    }

    #[test]
    fn car_remove_from_each_list() {
        let cache = cache(2);
        cache.compute(1).unwrap();
        cache.compute(2).unwrap();
        cache.compute(3).unwrap();
        assert_eq!(cache.dump().b1, vec![1]);

        assert!(cache.remove(&1));
        assert_eq!(cache.b1_len(), 0);
        assert!(cache.remove(&2));
        assert!(!cache.contains(&2));
        assert!(!cache.remove(&99));
        assert_eq!(cache.key_count(), 1);
    }

    #[test]
    fn car_clear_resets_everything() {
        let cache = cache(2);
        for key in [1, 2, 3, 1, 4, 4] {
            cache.compute(key).unwrap();
        }
        assert!(cache.hit_rate() > 0.0);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.key_count(), 0);
        assert_eq!(cache.t1_len() + cache.t2_len() + cache.b1_len() + cache.b2_len(), 0);
        assert_eq!(cache.p(), 0);
        assert_eq!(cache.hit_rate(), 0.0);

        cache.clear();
        assert_eq!(cache.key_count(), 0);
        assert_eq!(cache.compute(5), Ok(50));
    }

    #[test]
    fn car_release_matching_spans_all_lists() {
        let cache = cache(4);
        for key in 0..6 {
            cache.compute(key).unwrap();
        }
        let dump = cache.dump();
        assert_eq!(dump.t1, vec![2, 3, 4, 5]);
        assert_eq!(dump.b1, vec![1]);

        assert_eq!(cache.release_matching(|k| k % 2 == 0), 2);
        assert_eq!(cache.key_count(), 3);
        assert_eq!(cache.release_matching(|k| *k == 1), 1);
        assert_eq!(cache.b1_len(), 0);
    }

    #[test]
    fn car_peek_does_not_count_or_mark() {
        let cache = cache(4);
        cache.compute(1).unwrap();
        assert_eq!(cache.peek(&1), Some(10));
        assert_eq!(cache.peek(&2), None);
        assert!(!cache.state.read().t1.is_referenced(&1).unwrap());
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn car_capacity_one() {
        let cache = cache(1);
        for key in 0..20 {
            cache.compute(key % 3).unwrap();
            assert!(cache.len() <= 1);
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn car_dump_display_lists_everything() {
        let cache = letters(2);
        cache.compute("A").unwrap();
        cache.compute("B").unwrap();
        cache.compute("C").unwrap();
        let text = cache.dump().to_string();
        assert_eq!(
            text,
            "p=0 max_size=2\nT1: [\"B\", \"C\"]\nT2: []\nB1: [\"A\"]\nB2: []"
        );
    }

    fn weak_len_cache(
        weak_keys: bool,
        calls: Arc<AtomicUsize>,
    ) -> CarCache<WeakKey<String>, usize, impl ValueComputer<WeakKey<String>, usize, Error = Infallible>>
    {
        CarCache::new(
            move |k: &WeakKey<String>| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ComputeError<usize, Infallible>>(k.upgrade().map_or(0, |s| s.len()))
            },
            4,
            weak_keys,
        )
    }

    #[test]
    fn car_stale_purge_removes_dead_keys() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = weak_len_cache(true, Arc::clone(&calls));
        let alpha = Arc::new("alpha".to_string());
        let beta = Arc::new("be".to_string());
        let alpha_key = WeakKey::new(&alpha);

        assert_eq!(cache.compute(alpha_key.clone()), Ok(5));
        assert_eq!(cache.compute(WeakKey::new(&beta)), Ok(2));
        assert_eq!(cache.clear_stale_references(), 0);

        drop(alpha);
        assert_eq!(cache.clear_stale_references(), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&alpha_key));

        assert_eq!(cache.compute(alpha_key), Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn car_strong_mode_never_purges() {
        let cache = weak_len_cache(false, Arc::new(AtomicUsize::new(0)));
        let gone = Arc::new("gone".to_string());
        cache.compute(WeakKey::new(&gone)).unwrap();
        drop(gone);
        assert_eq!(cache.clear_stale_references(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn car_replace_drops_dead_keys_without_ghosting() {
        let cache = CarCache::new(
            |k: &WeakKey<String>| Ok::<_, ComputeError<usize, Infallible>>(k.strong_count()),
            2,
            true,
        );
        let a = Arc::new("a".to_string());
        let b = Arc::new("b".to_string());
        let c = Arc::new("c".to_string());
        cache.compute(WeakKey::new(&a)).unwrap();
        cache.compute(WeakKey::new(&b)).unwrap();
        drop(a);

        cache.compute(WeakKey::new(&c)).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.b1_len(), 0);
        assert!(cache.contains(&WeakKey::new(&b)));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn car_metrics_snapshot_tracks_activity() {
        let cache = letters(2);
        for key in ["A", "B", "A", "C", "D"] {
            cache.compute(key).unwrap();
        }
        let snap = cache.snapshot();
        assert_eq!(snap.tries, 5);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 4);
        assert_eq!(snap.admissions, 4);
        assert_eq!(snap.t1_to_t2_demotions, 1);
        assert_eq!(snap.t1_evictions, 2);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.max_size, 2);

        cache.clear();
        let snap = cache.snapshot();
        assert_eq!(snap.tries, 0);
        assert_eq!(snap.misses, 0);
        assert_eq!(snap.clears, 1);
    }

    #[test]
    fn car_debug_format_is_summary() {
        let cache = cache(3);
        cache.compute(1).unwrap();
        let text = format!("{cache:?}");
        assert!(text.contains("CarCache"));
        assert!(text.contains("t1_len: 1"));
    }
}

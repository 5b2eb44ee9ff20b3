//! Builder for CAR caches.
//!
//! Collects the configuration in one place and validates it when the cache
//! is built. `build*` panics on invalid settings, `try_build*` returns a
//! [`ConfigError`].
//!
//! ## Example
//!
//! ```rust
//! use carcache::builder::CarCacheBuilder;
//! use carcache::error::ComputeError;
//!
//! let cache = CarCacheBuilder::new(256)
//!     .name("descriptors")
//!     .build(|id: &u32| Ok::<_, ComputeError<String, ()>>(format!("descriptor-{id}")));
//!
//! assert_eq!(cache.compute(7).unwrap(), "descriptor-7");
//! assert_eq!(cache.name(), "descriptors");
//! ```

use std::hash::Hash;
use std::sync::Arc;

use crate::ds::Liveness;
use crate::error::ConfigError;
use crate::policy::car::{CarCache, DEFAULT_NAME};
#[cfg(feature = "concurrency")]
use crate::policy::sharded::ShardedCarCache;
use crate::traits::ValueComputer;

/// Configuration for [`CarCache`] and, with the `concurrency` feature,
/// `ShardedCarCache`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarCacheBuilder {
    max_size: usize,
    weak_keys: bool,
    name: String,
    shards: usize,
    shard_seed: u64,
}

impl CarCacheBuilder {
    /// Starts a configuration with room for `max_size` values.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            weak_keys: false,
            name: DEFAULT_NAME.to_string(),
            shards: 1,
            shard_seed: 0,
        }
    }

    /// Consult [`Liveness`] to discover keys whose referent is gone.
    pub fn weak_keys(mut self, weak_keys: bool) -> Self {
        self.weak_keys = weak_keys;
        self
    }

    /// Name carried by tracing events as the `cache` field.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of shards used by `build_sharded`.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Seed for the key-to-shard hash.
    pub fn shard_seed(mut self, seed: u64) -> Self {
        self.shard_seed = seed;
        self
    }

    /// Builds a single-lock cache.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero. Use [`try_build`](Self::try_build) for
    /// a fallible variant.
    pub fn build<K, V, C>(self, computer: C) -> CarCache<K, V, C>
    where
        K: Eq + Hash + Clone + Liveness,
        V: Clone,
        C: ValueComputer<K, V>,
    {
        match self.try_build(computer) {
            Ok(cache) => cache,
            Err(err) => panic!("{}", err),
        }
    }

    /// Builds a single-lock cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_size` is zero.
    pub fn try_build<K, V, C>(self, computer: C) -> Result<CarCache<K, V, C>, ConfigError>
    where
        K: Eq + Hash + Clone + Liveness,
        V: Clone,
        C: ValueComputer<K, V>,
    {
        CarCache::try_named(computer, self.max_size, self.weak_keys, Arc::from(self.name))
    }

    /// Builds a sharded cache with the configured shard count.
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration, see
    /// [`try_build_sharded`](Self::try_build_sharded).
    #[cfg(feature = "concurrency")]
    pub fn build_sharded<K, V, C>(self, computer: C) -> ShardedCarCache<K, V, C>
    where
        K: Eq + Hash + Clone + Liveness,
        V: Clone,
        C: ValueComputer<K, V>,
    {
        match self.try_build_sharded(computer) {
            Ok(cache) => cache,
            Err(err) => panic!("{}", err),
        }
    }

    /// Builds a sharded cache with the configured shard count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `shards` is zero or smaller than
    /// `max_size` allows.
    ///
    /// # Example
    ///
    /// ```
    /// use carcache::builder::CarCacheBuilder;
    /// use carcache::error::ComputeError;
    ///
    /// let cache = CarCacheBuilder::new(64)
    ///     .shards(8)
    ///     .shard_seed(7)
    ///     .try_build_sharded(|k: &u64| Ok::<_, ComputeError<u64, ()>>(k + 1))
    ///     .unwrap();
    /// assert_eq!(cache.shard_count(), 8);
    /// assert_eq!(cache.compute(1), Ok(2));
    /// ```
    #[cfg(feature = "concurrency")]
    pub fn try_build_sharded<K, V, C>(
        self,
        computer: C,
    ) -> Result<ShardedCarCache<K, V, C>, ConfigError>
    where
        K: Eq + Hash + Clone + Liveness,
        V: Clone,
        C: ValueComputer<K, V>,
    {
        ShardedCarCache::try_named(
            computer,
            self.max_size,
            self.shards,
            self.shard_seed,
            self.weak_keys,
            &self.name,
        )
    }
}

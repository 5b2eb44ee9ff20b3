//! Seeded key-to-shard mapping for [`ShardedCarCache`](crate::policy::sharded::ShardedCarCache).
//!
//! ```text
//!   key ──► FxHasher(seed, key) ──► hash % shards ──► shard index
//!
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ CAR #0  │ CAR #1  │ CAR #2  │ CAR #3  │   each shard: own lock, own p
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! The same `(key, seed, shards)` always yields the same shard, so a key's
//! cached value, ghost entry and reference bit all live in one shard.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Deterministic shard selector using a seeded hash.
///
/// # Example
///
/// ```
/// use carcache::ds::ShardSelector;
///
/// let selector = ShardSelector::new(8, 42);
/// let shard = selector.shard_for_key(&"user:123");
/// assert!(shard < 8);
/// assert_eq!(selector.shard_for_key(&"user:123"), shard);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards. Zero is clamped to one.
    pub fn new(shards: usize, seed: u64) -> Self {
        Self {
            shards: shards.max(1),
            seed,
        }
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Returns the seed mixed into every hash.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Maps a key to a shard index in `[0, shards)`.
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        if self.shards == 1 {
            return 0;
        }
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector with seed 0.
    fn default() -> Self {
        Self::new(1, 0)
    }
}

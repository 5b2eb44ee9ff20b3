/// Point-in-time copy of a CAR cache's counters and list sizes.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CarMetricsSnapshot {
    pub tries: u64,
    pub hits: u64,
    pub misses: u64,
    pub uncacheable: u64,
    pub compute_failures: u64,
    pub admissions: u64,
    pub clears: u64,

    pub t1_evictions: u64,
    pub t2_evictions: u64,
    pub stale_evictions: u64, // dead keys dropped by the sweep instead of ghosted
    pub t1_to_t2_demotions: u64,
    pub hand_sweeps: u64, // T2 reference bits cleared by the sweep
    pub ghost_recent_hits: u64,
    pub ghost_frequent_hits: u64,
    pub target_increases: u64,
    pub target_decreases: u64,
    pub ghost_trims: u64,
    pub stale_purged: u64,
    pub released: u64,

    // gauges captured at snapshot time
    pub t1_len: usize,
    pub t2_len: usize,
    pub b1_len: usize,
    pub b2_len: usize,
    pub p: usize,
    pub max_size: usize,
}

impl CarMetricsSnapshot {
    /// Percentage of `compute` calls served from the cache.
    pub fn hit_rate(&self) -> f64 {
        if self.tries == 0 {
            0.0
        } else {
            self.hits as f64 * 100.0 / self.tries as f64
        }
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.t1_len + self.t2_len
    }

    /// Returns `true` if no values were cached at snapshot time.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries that left T1 ∪ T2 through the sweep.
    pub fn evictions(&self) -> u64 {
        self.t1_evictions + self.t2_evictions + self.stale_evictions
    }

    /// Adds `other` into `self`. Gauges are summed too, so the result of
    /// merging every shard describes the whole sharded cache.
    pub fn merge(&mut self, other: &Self) {
        self.tries += other.tries;
        self.hits += other.hits;
        self.misses += other.misses;
        self.uncacheable += other.uncacheable;
        self.compute_failures += other.compute_failures;
        self.admissions += other.admissions;
        self.clears += other.clears;
        self.t1_evictions += other.t1_evictions;
        self.t2_evictions += other.t2_evictions;
        self.stale_evictions += other.stale_evictions;
        self.t1_to_t2_demotions += other.t1_to_t2_demotions;
        self.hand_sweeps += other.hand_sweeps;
        self.ghost_recent_hits += other.ghost_recent_hits;
        self.ghost_frequent_hits += other.ghost_frequent_hits;
        self.target_increases += other.target_increases;
        self.target_decreases += other.target_decreases;
        self.ghost_trims += other.ghost_trims;
        self.stale_purged += other.stale_purged;
        self.released += other.released;
        self.t1_len += other.t1_len;
        self.t2_len += other.t2_len;
        self.b1_len += other.b1_len;
        self.b2_len += other.b2_len;
        self.p += other.p;
        self.max_size += other.max_size;
    }
}

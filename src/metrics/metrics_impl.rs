use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::CarMetricsSnapshot;
use crate::metrics::traits::{
    CarMetricsRecorder, CoreMetricsRecorder, MetricsReset, MetricsSnapshotProvider,
};

/// Atomic CAR counters.
///
/// Relaxed ordering throughout: the counters are observational and are not
/// linearizable with the cache structures they describe.
#[derive(Debug, Default)]
pub struct CarMetrics {
    misses: AtomicU64,
    uncacheable: AtomicU64,
    compute_failures: AtomicU64,
    admissions: AtomicU64,
    clears: AtomicU64,
    t1_evictions: AtomicU64,
    t2_evictions: AtomicU64,
    stale_evictions: AtomicU64,
    t1_to_t2_demotions: AtomicU64,
    hand_sweeps: AtomicU64,
    ghost_recent_hits: AtomicU64,
    ghost_frequent_hits: AtomicU64,
    target_increases: AtomicU64,
    target_decreases: AtomicU64,
    ghost_trims: AtomicU64,
    stale_purged: AtomicU64,
    released: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

#[inline]
fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

impl CarMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoreMetricsRecorder for CarMetrics {
    fn record_miss(&self) {
        bump(&self.misses);
    }
    fn record_uncacheable(&self) {
        bump(&self.uncacheable);
    }
    fn record_compute_failure(&self) {
        bump(&self.compute_failures);
    }
    fn record_admission(&self) {
        bump(&self.admissions);
    }
    fn record_clear(&self) {
        bump(&self.clears);
    }
}

impl CarMetricsRecorder for CarMetrics {
    fn record_t1_eviction(&self) {
        bump(&self.t1_evictions);
    }
    fn record_t2_eviction(&self) {
        bump(&self.t2_evictions);
    }
    fn record_stale_eviction(&self) {
        bump(&self.stale_evictions);
    }
    fn record_t1_to_t2_demotion(&self) {
        bump(&self.t1_to_t2_demotions);
    }
    fn record_hand_sweep(&self) {
        bump(&self.hand_sweeps);
    }
    fn record_ghost_recent_hit(&self) {
        bump(&self.ghost_recent_hits);
    }
    fn record_ghost_frequent_hit(&self) {
        bump(&self.ghost_frequent_hits);
    }
    fn record_target_increase(&self) {
        bump(&self.target_increases);
    }
    fn record_target_decrease(&self) {
        bump(&self.target_decreases);
    }
    fn record_ghost_trim(&self) {
        bump(&self.ghost_trims);
    }
    fn record_stale_purged(&self, count: usize) {
        add(&self.stale_purged, count);
    }
    fn record_released(&self, count: usize) {
        add(&self.released, count);
    }
}

impl MetricsSnapshotProvider<CarMetricsSnapshot> for CarMetrics {
    /// Counter-only snapshot; the owning cache fills in tries, hits and gauges.
    fn snapshot(&self) -> CarMetricsSnapshot {
        CarMetricsSnapshot {
            misses: load(&self.misses),
            uncacheable: load(&self.uncacheable),
            compute_failures: load(&self.compute_failures),
            admissions: load(&self.admissions),
            clears: load(&self.clears),
            t1_evictions: load(&self.t1_evictions),
            t2_evictions: load(&self.t2_evictions),
            stale_evictions: load(&self.stale_evictions),
            t1_to_t2_demotions: load(&self.t1_to_t2_demotions),
            hand_sweeps: load(&self.hand_sweeps),
            ghost_recent_hits: load(&self.ghost_recent_hits),
            ghost_frequent_hits: load(&self.ghost_frequent_hits),
            target_increases: load(&self.target_increases),
            target_decreases: load(&self.target_decreases),
            ghost_trims: load(&self.ghost_trims),
            stale_purged: load(&self.stale_purged),
            released: load(&self.released),
            ..Default::default()
        }
    }
}

impl MetricsReset for CarMetrics {
    fn reset_metrics(&self) {
        for counter in [
            &self.misses,
            &self.uncacheable,
            &self.compute_failures,
            &self.admissions,
            &self.clears,
            &self.t1_evictions,
            &self.t2_evictions,
            &self.stale_evictions,
            &self.t1_to_t2_demotions,
            &self.hand_sweeps,
            &self.ghost_recent_hits,
            &self.ghost_frequent_hits,
            &self.target_increases,
            &self.target_decreases,
            &self.ghost_trims,
            &self.stale_purged,
            &self.released,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

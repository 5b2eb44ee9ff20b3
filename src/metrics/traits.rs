//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are separate responsibilities.
//!
//! ```text
//!          ┌─────────────────────────────┐
//!          │     CoreMetricsRecorder     │
//!          │  miss / uncacheable / fail  │
//!          │  admission / clear          │
//!          └──────────────┬──────────────┘
//!                         │
//!                         ▼
//!          ┌─────────────────────────────┐
//!          │     CarMetricsRecorder      │
//!          │  evictions, demotions,      │
//!          │  ghost hits, p moves, purge │
//!          └─────────────────────────────┘
//!
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (tests, dashboards)          │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Recorders take `&self`: counters are atomics, so the hit path can record
//! under a shared lock.

/// Counters common to any compute-and-cache policy.
pub trait CoreMetricsRecorder {
    fn record_miss(&self);
    fn record_uncacheable(&self);
    fn record_compute_failure(&self);
    fn record_admission(&self);
    fn record_clear(&self);
}

/// Counters specific to CAR (clock with adaptive replacement).
pub trait CarMetricsRecorder: CoreMetricsRecorder {
    fn record_t1_eviction(&self);
    fn record_t2_eviction(&self);
    fn record_stale_eviction(&self);
    fn record_t1_to_t2_demotion(&self);
    fn record_hand_sweep(&self);
    fn record_ghost_recent_hit(&self);
    fn record_ghost_frequent_hit(&self);
    fn record_target_increase(&self);
    fn record_target_decrease(&self);
    fn record_ghost_trim(&self);
    fn record_stale_purged(&self, count: usize);
    fn record_released(&self, count: usize);
}

/// Produces a point-in-time copy of the counters.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Publishes snapshots to a monitoring backend.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}

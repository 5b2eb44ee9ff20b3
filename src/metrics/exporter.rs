use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::CarMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for CAR metrics snapshots.
///
/// Writes the Prometheus text exposition format so the output can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the exporter and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", suffix, value);
    }

    fn write_gauge(&self, suffix: &str, value: usize) {
        self.write_metric("gauge", suffix, value as u64);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<CarMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CarMetricsSnapshot) {
        self.write_counter("compute_calls_total", snapshot.tries);
        self.write_counter("compute_hits_total", snapshot.hits);
        self.write_counter("compute_misses_total", snapshot.misses);
        self.write_counter("uncacheable_total", snapshot.uncacheable);
        self.write_counter("compute_failures_total", snapshot.compute_failures);
        self.write_counter("admissions_total", snapshot.admissions);
        self.write_counter("clears_total", snapshot.clears);
        self.write_counter("t1_evictions_total", snapshot.t1_evictions);
        self.write_counter("t2_evictions_total", snapshot.t2_evictions);
        self.write_counter("stale_evictions_total", snapshot.stale_evictions);
        self.write_counter("t1_to_t2_demotions_total", snapshot.t1_to_t2_demotions);
        self.write_counter("hand_sweeps_total", snapshot.hand_sweeps);
        self.write_counter("ghost_recent_hits_total", snapshot.ghost_recent_hits);
        self.write_counter("ghost_frequent_hits_total", snapshot.ghost_frequent_hits);
        self.write_counter("target_increases_total", snapshot.target_increases);
        self.write_counter("target_decreases_total", snapshot.target_decreases);
        self.write_counter("ghost_trims_total", snapshot.ghost_trims);
        self.write_counter("stale_purged_total", snapshot.stale_purged);
        self.write_counter("released_total", snapshot.released);
        self.write_gauge("t1_len", snapshot.t1_len);
        self.write_gauge("t2_len", snapshot.t2_len);
        self.write_gauge("b1_len", snapshot.b1_len);
        self.write_gauge("b2_len", snapshot.b2_len);
        self.write_gauge("target_t1_size", snapshot.p);
        self.write_gauge("capacity", snapshot.max_size);
    }
}

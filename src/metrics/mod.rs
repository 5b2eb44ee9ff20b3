pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::CarMetrics;
pub use snapshot::CarMetricsSnapshot;
pub use traits::{
    CarMetricsRecorder, CoreMetricsRecorder, MetricsExporter, MetricsReset,
    MetricsSnapshotProvider,
};

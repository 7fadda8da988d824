//! Metric instruments, the buffering pipeline and OTLP export.

pub mod buffer;
pub mod exporter;
pub mod instruments;
pub mod otlp;
pub mod point;
pub mod registry;

pub use buffer::{BufferStats, MetricsBuffer};
pub use exporter::{MetricsExporter, NullExporter, OtlpHttpExporter};
pub use instruments::{
    Counter, Gauge, Histogram, LiveCounter, LiveGauge, LiveHistogram, NoopCounter, NoopGauge,
    NoopHistogram,
};
pub use point::{metric_key, MetricDataPoint, MetricKind, Tags};
pub use registry::MetricsRegistry;

//! TraceKit APM client
//!
//! Counters, gauges and histograms keyed by name and tags feed a shared
//! buffer that flushes to an OTLP/HTTP collector when it fills up, on a
//! background interval, and at shutdown. Spans are started and ended through
//! a thin wrapper over a pluggable tracing engine that normalizes attributes
//! and records errors with stack traces the backend can parse.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracekit::{ClientCell, NoopTracer, SpanStatus, Tags, TracekitConfig};
//!
//! static TRACEKIT: ClientCell = ClientCell::new();
//!
//! let client = TRACEKIT
//!     .init(TracekitConfig::new("api-key").with_service_name("checkout"), Arc::new(NoopTracer))
//!     .unwrap();
//!
//! let mut tags = Tags::new();
//! tags.insert("route".into(), "/cart".into());
//! client.counter("http.requests", &tags).inc();
//!
//! let mut span = client.start_trace("GET /cart", &[]);
//! client.end_span(&mut span, &[], SpanStatus::Ok);
//!
//! client.shutdown();
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod net;
pub mod trace;

// Re-export main types
pub use client::{ClientCell, SnapshotCapture, TracekitClient};
pub use config::{extract_base_url, resolve_endpoint, BufferConfig, TracekitConfig};
pub use error::{ExportError, TracekitError};
pub use metrics::{
    BufferStats, Counter, Gauge, Histogram, MetricDataPoint, MetricKind, MetricsBuffer,
    MetricsExporter, MetricsRegistry, NullExporter, OtlpHttpExporter, Tags,
};
pub use net::client_ip;
pub use trace::{
    AttributeValue, Attributes, EngineSpan, Exception, NoopTracer, Span, SpanKind, SpanStatus,
    SpanTracer, StackFrame, Status, Tracer,
};

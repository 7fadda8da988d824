//! The client handle tying metrics, spans and snapshot capture together.

use crate::config::TracekitConfig;
use crate::error::TracekitError;
use crate::metrics::{
    Counter, Gauge, Histogram, MetricsExporter, MetricsRegistry, NoopCounter, NoopGauge,
    NoopHistogram, Tags,
};
use crate::trace::{Exception, Span, SpanStatus, SpanTracer, Tracer};
use rand::Rng;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Hook into the code snapshot subsystem.
pub trait SnapshotCapture: Send + Sync {
    /// Captures `variables` under `label` if a breakpoint is registered for it.
    fn capture(&self, label: &str, variables: &[(&str, Value)]);

    /// Stops background polling. Called once during client shutdown.
    fn stop(&self) {}
}

/// APM client: instrument factory, span helpers and lifecycle owner.
pub struct TracekitClient {
    config: TracekitConfig,
    spans: SpanTracer,
    metrics: Option<MetricsRegistry>,
    snapshots: Option<Arc<dyn SnapshotCapture>>,
}

impl TracekitClient {
    /// Creates a client exporting metrics over OTLP/HTTP to the configured endpoint.
    pub fn new(config: TracekitConfig, tracer: Arc<dyn Tracer>) -> Result<Self, TracekitError> {
        config.validate()?;
        let metrics = if config.enabled {
            Some(MetricsRegistry::otlp(&config)?)
        } else {
            None
        };
        Ok(Self::assemble(config, tracer, metrics))
    }

    /// Creates a client exporting metrics through `exporter`.
    pub fn with_exporter(
        config: TracekitConfig,
        tracer: Arc<dyn Tracer>,
        exporter: Arc<dyn MetricsExporter>,
    ) -> Result<Self, TracekitError> {
        config.validate()?;
        let metrics = if config.enabled {
            Some(MetricsRegistry::new(config.metrics, exporter)?)
        } else {
            None
        };
        Ok(Self::assemble(config, tracer, metrics))
    }

    fn assemble(
        config: TracekitConfig,
        tracer: Arc<dyn Tracer>,
        metrics: Option<MetricsRegistry>,
    ) -> Self {
        tracing::info!(
            service = %config.service_name,
            enabled = config.enabled,
            traces_endpoint = %config.traces_endpoint(),
            "tracekit client created"
        );
        Self {
            config,
            spans: SpanTracer::new(tracer),
            metrics,
            snapshots: None,
        }
    }

    /// Attaches the snapshot subsystem. Ignored unless code monitoring is enabled.
    pub fn with_snapshot_capture(mut self, capture: Arc<dyn SnapshotCapture>) -> Self {
        if self.config.enable_code_monitoring {
            self.snapshots = Some(capture);
        } else {
            tracing::debug!("code monitoring disabled, snapshot capture not attached");
        }
        self
    }

    pub fn config(&self) -> &TracekitConfig {
        &self.config
    }

    /// Metrics registry, absent when the client is disabled.
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    pub fn spans(&self) -> &SpanTracer {
        &self.spans
    }

    /// Returns the counter for `name` and `tags`, or a no-op when disabled.
    pub fn counter(&self, name: &str, tags: &Tags) -> Arc<dyn Counter> {
        match &self.metrics {
            Some(registry) => registry.counter(name, tags),
            None => Arc::new(NoopCounter),
        }
    }

    /// Returns the gauge for `name` and `tags`, or a no-op when disabled.
    pub fn gauge(&self, name: &str, tags: &Tags) -> Arc<dyn Gauge> {
        match &self.metrics {
            Some(registry) => registry.gauge(name, tags),
            None => Arc::new(NoopGauge),
        }
    }

    /// Returns the histogram for `name` and `tags`, or a no-op when disabled.
    pub fn histogram(&self, name: &str, tags: &Tags) -> Arc<dyn Histogram> {
        match &self.metrics {
            Some(registry) => registry.histogram(name, tags),
            None => Arc::new(NoopHistogram),
        }
    }

    pub fn start_trace(&self, name: &str, attributes: &[(&str, Value)]) -> Span {
        self.spans.start_trace(name, attributes)
    }

    pub fn start_span(&self, name: &str, attributes: &[(&str, Value)]) -> Span {
        self.spans.start_span(name, attributes)
    }

    pub fn end_span(&self, span: &mut Span, final_attributes: &[(&str, Value)], status: SpanStatus) {
        self.spans.end_span(span, final_attributes, status);
    }

    pub fn add_event(&self, span: &mut Span, name: &str, attributes: &[(&str, Value)]) {
        self.spans.add_event(span, name, attributes);
    }

    pub fn record_exception(&self, span: &mut Span, exception: &Exception) {
        self.spans.record_exception(span, exception);
    }

    /// `true` when enabled and an API key is configured.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.is_empty()
    }

    /// Decides whether the current request should be traced.
    pub fn should_sample(&self) -> bool {
        rand::thread_rng().gen::<f64>() < self.config.sample_rate
    }

    /// Forwards a snapshot request to the snapshot subsystem, if attached.
    pub fn capture_snapshot(&self, label: &str, variables: &[(&str, Value)]) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.capture(label, variables);
        }
    }

    /// Base URL for the snapshot subsystem.
    pub fn snapshot_base_url(&self) -> String {
        self.config.snapshot_endpoint()
    }

    /// Exports pending metrics now.
    pub fn flush(&self) {
        if let Some(registry) = &self.metrics {
            registry.buffer().flush();
        }
    }

    /// Stops snapshot capture, then shuts the metrics pipeline down.
    pub fn shutdown(&self) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.stop();
        }
        if let Some(registry) = &self.metrics {
            registry.shutdown();
        }
        tracing::info!(service = %self.config.service_name, "tracekit client shut down");
    }
}

/// Holds the client once initialized.
///
/// Owned by the application and passed to whatever needs the client; reading
/// it before [`init`](Self::init) is an explicit [`TracekitError::NotInitialized`].
#[derive(Default)]
pub struct ClientCell {
    client: OnceLock<Arc<TracekitClient>>,
}

impl ClientCell {
    pub const fn new() -> Self {
        Self {
            client: OnceLock::new(),
        }
    }

    /// Builds a client from `config` and stores it.
    pub fn init(
        &self,
        config: TracekitConfig,
        tracer: Arc<dyn Tracer>,
    ) -> Result<Arc<TracekitClient>, TracekitError> {
        if self.client.get().is_some() {
            return Err(TracekitError::AlreadyInitialized);
        }
        self.install(TracekitClient::new(config, tracer)?)
    }

    /// Stores an already built client.
    pub fn install(&self, client: TracekitClient) -> Result<Arc<TracekitClient>, TracekitError> {
        let client = Arc::new(client);
        match self.client.set(Arc::clone(&client)) {
            Ok(()) => Ok(client),
            Err(rejected) => {
                rejected.shutdown();
                Err(TracekitError::AlreadyInitialized)
            }
        }
    }

    /// Returns the client, or `NotInitialized` before `init`.
    pub fn get(&self) -> Result<Arc<TracekitClient>, TracekitError> {
        self.client.get().cloned().ok_or(TracekitError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }
}

//! Metric exporters: the trait the buffer flushes through and its implementations.

use super::otlp;
use super::point::MetricDataPoint;
use crate::error::ExportError;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::thread;
use std::time::Duration;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Bound on a single export request, connect through body read.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for shipping a flushed batch of data points.
///
/// Called from producers (size-triggered flush) and from the flush worker.
/// A producer may be a thread inside an async runtime, so implementations
/// must not depend on the calling thread's runtime context.
pub trait MetricsExporter: Send + Sync {
    /// Exports a batch. An empty batch must succeed without side effects.
    fn export(&self, points: Vec<MetricDataPoint>) -> Result<(), ExportError>;

    /// Returns the exporter name for logging.
    fn name(&self) -> &str;
}

/// One request handed to the HTTP thread.
struct Delivery {
    body: Vec<u8>,
    reply: Sender<Result<(), ExportError>>,
}

/// Exporter that POSTs OTLP/JSON to a collector.
///
/// The blocking HTTP client lives on a dedicated thread and is created, used
/// and dropped only there, so `export` can be called from any thread,
/// including tokio worker threads. The caller still blocks until the
/// collector answers. The thread exits once the exporter is dropped.
pub struct OtlpHttpExporter {
    endpoint: String,
    service_name: String,
    deliveries: Sender<Delivery>,
}

impl OtlpHttpExporter {
    /// Creates an exporter for a fully resolved `endpoint` URL.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<Self, ExportError> {
        let endpoint = endpoint.into();
        let poster = HttpPoster {
            endpoint: endpoint.clone(),
            api_key: api_key.into(),
        };
        let (deliveries, incoming) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        thread::Builder::new()
            .name("tracekit-metrics-http".into())
            .spawn(move || poster.run(&incoming, &ready_tx))
            .map_err(|e| ExportError::Transport(format!("failed to spawn HTTP thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| ExportError::Transport("HTTP thread exited during setup".into()))??;

        Ok(Self {
            endpoint,
            service_name: service_name.into(),
            deliveries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Serializes `points` into the request body.
    pub fn encode(&self, points: &[MetricDataPoint]) -> Result<Vec<u8>, ExportError> {
        serde_json::to_vec(&otlp::encode(&self.service_name, points))
            .map_err(|e| ExportError::Serialization(e.to_string()))
    }
}

impl MetricsExporter for OtlpHttpExporter {
    fn export(&self, points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = self.encode(&points)?;
        let (reply, response) = bounded(1);
        let stopped = || ExportError::Transport("HTTP thread stopped".into());

        self.deliveries
            .send(Delivery { body, reply })
            .map_err(|_| stopped())?;
        response.recv().map_err(|_| stopped())??;

        tracing::debug!(
            endpoint = %self.endpoint,
            points = points.len(),
            "exported metrics"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "otlp_http"
    }
}

/// Owner of the blocking client, running on the HTTP thread.
struct HttpPoster {
    endpoint: String,
    api_key: String,
}

impl HttpPoster {
    fn run(&self, incoming: &Receiver<Delivery>, ready: &Sender<Result<(), ExportError>>) {
        // No idle connections are kept: every request closes its connection.
        let client = match Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                let _ = ready.send(Err(ExportError::Transport(format!(
                    "failed to create HTTP client: {e}"
                ))));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        // Ends when the exporter, and with it the last sender, is dropped.
        for delivery in incoming {
            let _ = delivery.reply.send(self.post(&client, delivery.body));
        }
    }

    fn post(&self, client: &Client, body: Vec<u8>) -> Result<(), ExportError> {
        // Content-Length is set by reqwest from the sized body.
        let response = client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .body(body)
            .send()
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        let status = response.status();
        let drained = response.bytes();

        if status != StatusCode::OK {
            return Err(ExportError::Status(status.as_u16()));
        }
        drained.map_err(|e| ExportError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Exporter that discards every batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExporter;

impl NullExporter {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsExporter for NullExporter {
    fn export(&self, _points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Test exporter that records every exported batch
#[cfg(test)]
pub struct TestExporter {
    batches: std::sync::Mutex<Vec<Vec<MetricDataPoint>>>,
}

#[cfg(test)]
impl Default for TestExporter {
    fn default() -> Self {
        Self {
            batches: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl TestExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn batches(&self) -> Vec<Vec<MetricDataPoint>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn all_points(&self) -> Vec<MetricDataPoint> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
impl MetricsExporter for TestExporter {
    fn export(&self, points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(points);
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Exporter that always fails, counting attempts
#[cfg(test)]
#[derive(Default)]
pub struct FailingExporter {
    attempts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FailingExporter {
    pub fn attempts(&self) -> usize {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl MetricsExporter for FailingExporter {
    fn export(&self, _points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
        self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(ExportError::Status(500))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

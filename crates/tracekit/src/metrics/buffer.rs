//! Metrics buffer with size- and time-triggered flushing.
//!
//! Producers append under a short-lived lock. When the pending list reaches
//! `max_size` the producer that crossed the threshold flushes synchronously;
//! otherwise a single background worker flushes every `flush_interval`.
//!
//! A flush swaps the pending list out while holding the lock and exports the
//! swapped-out batch after releasing it, so the lock is never held across I/O.
//! Delivery is at-most-once: a failed or panicking export is logged and its
//! batch dropped. Neither reaches the producer or stops the worker.

use super::exporter::MetricsExporter;
use super::point::MetricDataPoint;
use crate::config::BufferConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Thread-safe delivery counters for a buffer.
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Points delivered successfully
    pub points_exported: AtomicU64,
    /// Batches delivered successfully
    pub batches_exported: AtomicU64,
    /// Failed export calls
    pub export_errors: AtomicU64,
    /// Points lost to failed exports or rejected after shutdown
    pub points_dropped: AtomicU64,
}

impl BufferStats {
    pub fn points_exported(&self) -> u64 {
        self.points_exported.load(Ordering::Relaxed)
    }

    pub fn batches_exported(&self) -> u64 {
        self.batches_exported.load(Ordering::Relaxed)
    }

    pub fn export_errors(&self) -> u64 {
        self.export_errors.load(Ordering::Relaxed)
    }

    pub fn points_dropped(&self) -> u64 {
        self.points_dropped.load(Ordering::Relaxed)
    }

    fn record_success(&self, point_count: u64) {
        self.points_exported.fetch_add(point_count, Ordering::Relaxed);
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, point_count: u64) {
        self.export_errors.fetch_add(1, Ordering::Relaxed);
        self.points_dropped.fetch_add(point_count, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.points_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared between producers and the flush worker.
struct Shared {
    pending: Mutex<Vec<MetricDataPoint>>,
    config: BufferConfig,
    exporter: Arc<dyn MetricsExporter>,
    shutdown: AtomicBool,
    stats: BufferStats,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Vec<MetricDataPoint>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn flush(&self) {
        let batch = {
            let mut pending = self.pending();
            if pending.is_empty() {
                return;
            }
            mem::take(&mut *pending)
        };

        let point_count = batch.len() as u64;
        let exported = panic::catch_unwind(AssertUnwindSafe(|| self.exporter.export(batch)));
        match exported {
            Ok(Ok(())) => {
                self.stats.record_success(point_count);
                tracing::debug!(
                    exporter = self.exporter.name(),
                    points = point_count,
                    "flushed metrics"
                );
            }
            Ok(Err(e)) => {
                self.stats.record_error(point_count);
                tracing::warn!(
                    exporter = self.exporter.name(),
                    points = point_count,
                    error = %e,
                    "failed to export metrics, dropping batch"
                );
            }
            Err(_) => {
                self.stats.record_error(point_count);
                tracing::error!(
                    exporter = self.exporter.name(),
                    points = point_count,
                    "metrics exporter panicked, dropping batch"
                );
            }
        }
    }
}

/// Handle to the background flush thread.
struct Worker {
    handle: JoinHandle<()>,
    cancel_tx: Sender<()>,
    done_rx: Receiver<()>,
}

fn run_worker(shared: Arc<Shared>, cancel_rx: Receiver<()>, done_tx: Sender<()>) {
    tracing::info!(interval = ?shared.config.flush_interval, "metrics flush worker started");

    loop {
        match cancel_rx.recv_timeout(shared.config.flush_interval) {
            Err(RecvTimeoutError::Timeout) => {
                if shared.is_shutdown() {
                    break;
                }
                shared.flush();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::info!("metrics flush worker stopped");
    let _ = done_tx.send(());
}

/// Buffer of pending data points feeding a [`MetricsExporter`].
pub struct MetricsBuffer {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl MetricsBuffer {
    /// Creates a buffer. No worker runs until [`start`](Self::start) is called.
    pub fn new(config: BufferConfig, exporter: Arc<dyn MetricsExporter>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Vec::with_capacity(config.max_size)),
                config,
                exporter,
                shutdown: AtomicBool::new(false),
                stats: BufferStats::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the periodic flush worker.
    ///
    /// Has no effect if a worker is already running or the buffer is shut down.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = self.worker();
        if worker.is_some() || self.shared.is_shutdown() {
            return Ok(());
        }

        let (cancel_tx, cancel_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name("tracekit-metrics-flush".into())
            .spawn(move || run_worker(shared, cancel_rx, done_tx))?;

        *worker = Some(Worker {
            handle,
            cancel_tx,
            done_rx,
        });
        Ok(())
    }

    /// Appends a point, flushing on this thread if the buffer is full.
    ///
    /// Points added after [`shutdown`](Self::shutdown) are dropped.
    pub fn add(&self, point: MetricDataPoint) {
        let should_flush = {
            let mut pending = self.shared.pending();
            // Checked under the lock so an accepted point is always seen by the final flush
            if self.shared.is_shutdown() {
                drop(pending);
                self.shared.stats.record_dropped();
                return;
            }
            pending.push(point);
            pending.len() >= self.shared.config.max_size
        };

        if should_flush {
            self.shared.flush();
        }
    }

    /// Exports everything pending. A no-op when empty.
    pub fn flush(&self) {
        self.shared.flush();
    }

    /// Stops the worker and performs a final flush.
    ///
    /// Waits at most `shutdown_timeout` for the worker; a worker stuck in an
    /// export is detached. Calling this again only re-runs the (empty) flush.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);

        let worker = self.worker().take();
        if let Some(worker) = worker {
            let _ = worker.cancel_tx.try_send(());

            match worker.done_rx.recv_timeout(self.shared.config.shutdown_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        tracing::error!("metrics flush worker panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        timeout = ?self.shared.config.shutdown_timeout,
                        "metrics flush worker did not stop in time, detaching"
                    );
                }
            }
        }

        self.shared.flush();
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Returns `true` while a flush worker is attached.
    pub fn is_running(&self) -> bool {
        self.worker().is_some()
    }

    /// Number of points waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.shared.pending().len()
    }

    pub fn config(&self) -> &BufferConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> &BufferStats {
        &self.shared.stats
    }
}

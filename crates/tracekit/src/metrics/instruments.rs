//! Metric instruments.
//!
//! Each kind is a trait so a disabled client can hand out no-op handles with
//! the same surface as the live ones. Live instruments forward every write to
//! the shared [`MetricsBuffer`]; none of them hold a lock while the buffer
//! runs a size-triggered flush.

use super::buffer::MetricsBuffer;
use super::point::{MetricDataPoint, MetricKind, Tags};
use std::sync::{Arc, Mutex, PoisonError};

/// Monotonically increasing value.
pub trait Counter: Send + Sync {
    /// Increments by 1.
    fn inc(&self) {
        self.add(1.0);
    }

    /// Adds `value`. Negative values are ignored.
    fn add(&self, value: f64);
}

/// Point-in-time value.
pub trait Gauge: Send + Sync {
    /// Sets the gauge to `value`.
    fn set(&self, value: f64);

    /// Increments by 1.
    fn inc(&self);

    /// Decrements by 1.
    fn dec(&self);
}

/// Distribution of recorded values.
pub trait Histogram: Send + Sync {
    /// Records a sample. Any finite or negative value is accepted.
    fn record(&self, value: f64);
}

/// Counter that emits into a buffer.
pub struct LiveCounter {
    name: String,
    tags: Tags,
    buffer: Arc<MetricsBuffer>,
}

impl LiveCounter {
    pub(crate) fn new(name: String, tags: Tags, buffer: Arc<MetricsBuffer>) -> Self {
        Self { name, tags, buffer }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Counter for LiveCounter {
    fn add(&self, value: f64) {
        if value < 0.0 || value.is_nan() {
            tracing::trace!(metric = %self.name, value, "ignoring negative counter delta");
            return;
        }

        self.buffer.add(MetricDataPoint::new(
            self.name.clone(),
            self.tags.clone(),
            value,
            MetricKind::Counter,
        ));
    }
}

/// Gauge that tracks its current value and emits it on every change.
pub struct LiveGauge {
    name: String,
    tags: Tags,
    value: Mutex<f64>,
    buffer: Arc<MetricsBuffer>,
}

impl LiveGauge {
    pub(crate) fn new(name: String, tags: Tags, buffer: Arc<MetricsBuffer>) -> Self {
        Self {
            name,
            tags,
            value: Mutex::new(0.0),
            buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Current value of the gauge.
    pub fn value(&self) -> f64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(f64) -> f64) {
        let value = {
            let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            *current = f(*current);
            *current
        };

        self.buffer.add(MetricDataPoint::new(
            self.name.clone(),
            self.tags.clone(),
            value,
            MetricKind::Gauge,
        ));
    }
}

impl Gauge for LiveGauge {
    fn set(&self, value: f64) {
        self.update(|_| value);
    }

    fn inc(&self) {
        self.update(|v| v + 1.0);
    }

    fn dec(&self) {
        self.update(|v| v - 1.0);
    }
}

/// Histogram that passes every sample through to the buffer.
pub struct LiveHistogram {
    name: String,
    tags: Tags,
    buffer: Arc<MetricsBuffer>,
}

impl LiveHistogram {
    pub(crate) fn new(name: String, tags: Tags, buffer: Arc<MetricsBuffer>) -> Self {
        Self { name, tags, buffer }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Histogram for LiveHistogram {
    fn record(&self, value: f64) {
        self.buffer.add(MetricDataPoint::new(
            self.name.clone(),
            self.tags.clone(),
            value,
            MetricKind::Histogram,
        ));
    }
}

/// Counter that discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounter;

impl Counter for NoopCounter {
    fn add(&self, _value: f64) {}
}

/// Gauge that discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGauge;

impl Gauge for NoopGauge {
    fn set(&self, _value: f64) {}
    fn inc(&self) {}
    fn dec(&self) {}
}

/// Histogram that discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHistogram;

impl Histogram for NoopHistogram {
    fn record(&self, _value: f64) {}
}

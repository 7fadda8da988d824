//! Metric data points and instrument keys.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tag set qualifying a metric. Kept sorted so keys derive deterministically.
pub type Tags = BTreeMap<String, String>;

/// Instrument kind that produced a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic delta
    Counter,
    /// Absolute point-in-time value
    Gauge,
    /// Raw distribution sample
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        })
    }
}

/// A single observation recorded by an instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDataPoint {
    name: String,
    tags: Tags,
    value: f64,
    /// Seconds since the Unix epoch
    timestamp: f64,
    kind: MetricKind,
}

impl MetricDataPoint {
    /// Creates a data point stamped with the current wall-clock time.
    pub fn new(name: impl Into<String>, tags: Tags, value: f64, kind: MetricKind) -> Self {
        Self::at(name, tags, value, unix_now(), kind)
    }

    /// Creates a data point with an explicit timestamp in seconds.
    pub fn at(
        name: impl Into<String>,
        tags: Tags,
        value: f64,
        timestamp: f64,
        kind: MetricKind,
    ) -> Self {
        Self {
            name: name.into(),
            tags,
            value,
            timestamp,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Timestamp converted to integer nanoseconds.
    pub fn time_unix_nano(&self) -> u64 {
        (self.timestamp * 1_000_000_000.0) as u64
    }
}

/// Derives the registry key for an instrument: `name` or `name{k1=v1,k2=v2}`.
pub fn metric_key(name: &str, tags: &Tags) -> String {
    if tags.is_empty() {
        return name.to_string();
    }

    let pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", pairs.join(","))
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

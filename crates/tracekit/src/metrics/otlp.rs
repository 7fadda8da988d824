//! OTLP/JSON encoding of metric data points.
//!
//! Points are grouped by `(name, kind)` in order of first appearance. Counters
//! become delta monotonic sums. Gauges and histograms both become plain gauge
//! points; histogram buckets are not reconstructed on the client.

use super::point::{MetricDataPoint, MetricKind, Tags};
use serde::Serialize;
use std::collections::HashMap;

/// `AGGREGATION_TEMPORALITY_DELTA` in the OTLP enum.
pub const AGGREGATION_TEMPORALITY_DELTA: i32 = 2;

/// Instrumentation scope name reported with every payload.
pub const SCOPE_NAME: &str = "tracekit";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetricsRequest {
    pub resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyValue {
    pub string_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeMetrics {
    pub scope: InstrumentationScope,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    #[serde(flatten)]
    pub data: MetricData,
}

/// Aggregation a metric is encoded under.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricData {
    Sum(Sum),
    Gauge(Gauge),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sum {
    pub data_points: Vec<NumberDataPoint>,
    pub aggregation_temporality: i32,
    pub is_monotonic: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gauge {
    pub data_points: Vec<NumberDataPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberDataPoint {
    pub attributes: Vec<KeyValue>,
    /// Integer nanoseconds, string-encoded as OTLP/JSON requires for 64-bit ints
    pub time_unix_nano: String,
    pub as_double: f64,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnyValue {
                string_value: value.into(),
            },
        }
    }
}

fn attributes(tags: &Tags) -> Vec<KeyValue> {
    tags.iter().map(|(k, v)| KeyValue::string(k, v)).collect()
}

impl From<&MetricDataPoint> for NumberDataPoint {
    fn from(point: &MetricDataPoint) -> Self {
        Self {
            attributes: attributes(point.tags()),
            time_unix_nano: point.time_unix_nano().to_string(),
            as_double: point.value(),
        }
    }
}

/// Builds the OTLP request for `points` under one resource and one scope.
pub fn encode(service_name: &str, points: &[MetricDataPoint]) -> ExportMetricsRequest {
    let mut index: HashMap<(&str, MetricKind), usize> = HashMap::new();
    let mut groups: Vec<(&str, MetricKind, Vec<NumberDataPoint>)> = Vec::new();

    for point in points {
        let slot = *index
            .entry((point.name(), point.kind()))
            .or_insert_with(|| {
                groups.push((point.name(), point.kind(), Vec::new()));
                groups.len() - 1
            });
        groups[slot].2.push(NumberDataPoint::from(point));
    }

    let metrics = groups
        .into_iter()
        .map(|(name, kind, data_points)| {
            let data = match kind {
                MetricKind::Counter => MetricData::Sum(Sum {
                    data_points,
                    aggregation_temporality: AGGREGATION_TEMPORALITY_DELTA,
                    is_monotonic: true,
                }),
                MetricKind::Gauge | MetricKind::Histogram => {
                    MetricData::Gauge(Gauge { data_points })
                }
            };
            Metric {
                name: name.to_string(),
                data,
            }
        })
        .collect();

    ExportMetricsRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Resource {
                attributes: vec![KeyValue::string("service.name", service_name)],
            },
            scope_metrics: vec![ScopeMetrics {
                scope: InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                metrics,
            }],
        }],
    }
}

//! Property-based tests for instrument keys, counter deltas and OTLP grouping.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracekit::metrics::{metric_key, otlp, MetricKind};
use tracekit::{
    BufferConfig, Counter, ExportError, MetricDataPoint, MetricsExporter, MetricsRegistry, Tags,
};

#[derive(Default)]
struct CollectingExporter {
    points: Mutex<Vec<MetricDataPoint>>,
}

impl MetricsExporter for CollectingExporter {
    fn export(&self, points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    fn name(&self) -> &str {
        "collecting"
    }
}

fn registry(exporter: Arc<CollectingExporter>) -> MetricsRegistry {
    let config = BufferConfig::default()
        .with_max_size(10_000)
        .with_flush_interval(Duration::from_secs(60));
    MetricsRegistry::new(config, exporter).unwrap()
}

proptest! {
    /// Any insertion order of the same pairs yields the key built from the
    /// pairs sorted by key.
    #[test]
    fn prop_key_ignores_tag_order(
        (sorted, shuffled) in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..6)
            .prop_flat_map(|pairs| {
                let pairs: Vec<(String, String)> = pairs.into_iter().collect();
                (Just(pairs.clone()), Just(pairs).prop_shuffle())
            }),
    ) {
        let mut tags = Tags::new();
        for (k, v) in &shuffled {
            tags.insert(k.clone(), v.clone());
        }

        let expected = if sorted.is_empty() {
            "m".to_string()
        } else {
            let body: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("m{{{}}}", body.join(","))
        };
        prop_assert_eq!(metric_key("m", &tags), expected);
    }

    /// Negative counter deltas emit nothing; non-negative ones emit exactly one point each.
    #[test]
    fn prop_counter_emits_only_non_negative(
        deltas in prop::collection::vec(-1_000.0f64..1_000.0, 0..50),
    ) {
        let exporter = Arc::new(CollectingExporter::default());
        let registry = registry(exporter.clone());
        let counter = registry.counter("c", &Tags::new());

        for delta in &deltas {
            counter.add(*delta);
        }
        registry.shutdown();

        let expected: Vec<f64> = deltas.iter().copied().filter(|d| *d >= 0.0).collect();
        let emitted: Vec<f64> = exporter
            .points
            .lock()
            .unwrap()
            .iter()
            .map(MetricDataPoint::value)
            .collect();
        prop_assert_eq!(emitted, expected);
    }

    /// Every point lands in exactly one metric entry, grouped by name and kind.
    #[test]
    fn prop_encoding_preserves_point_count(
        specs in prop::collection::vec((0usize..4, any::<bool>(), -10.0f64..10.0), 0..40),
    ) {
        let names = ["a", "b", "c", "d"];
        let points: Vec<MetricDataPoint> = specs
            .iter()
            .map(|(n, is_counter, value)| {
                let kind = if *is_counter { MetricKind::Counter } else { MetricKind::Gauge };
                MetricDataPoint::at(names[*n], Tags::new(), *value, 1_700_000_000.0, kind)
            })
            .collect();

        let body = serde_json::to_value(otlp::encode("svc", &points)).unwrap();
        let metrics = body["resourceMetrics"][0]["scopeMetrics"][0]["metrics"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut total = 0;
        let mut seen = std::collections::HashSet::new();
        for metric in &metrics {
            let (kind, data) = match metric.get("sum") {
                Some(sum) => ("sum", sum),
                None => ("gauge", &metric["gauge"]),
            };
            prop_assert!(seen.insert((metric["name"].as_str().unwrap_or_default().to_string(), kind)));
            total += data["dataPoints"].as_array().map_or(0, Vec::len);
        }
        prop_assert_eq!(total, points.len());
    }
}

//! Registry caching one instrument per name, kind and tag set.

use super::buffer::MetricsBuffer;
use super::exporter::{MetricsExporter, OtlpHttpExporter};
use super::instruments::{LiveCounter, LiveGauge, LiveHistogram};
use super::point::{metric_key, Tags};
use crate::config::{BufferConfig, TracekitConfig};
use crate::error::TracekitError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type InstrumentMap<T> = RwLock<HashMap<String, Arc<T>>>;

/// Creates and caches instruments keyed by name and tags.
///
/// Lookups take a shared read lock. On a miss the registry-wide creation lock
/// is taken and the map re-checked before constructing, so concurrent first
/// use of a key yields exactly one instrument.
pub struct MetricsRegistry {
    counters: InstrumentMap<LiveCounter>,
    gauges: InstrumentMap<LiveGauge>,
    histograms: InstrumentMap<LiveHistogram>,
    create_lock: Mutex<()>,
    buffer: Arc<MetricsBuffer>,
}

impl MetricsRegistry {
    /// Creates a registry whose buffer exports through `exporter` and starts
    /// the buffer's flush worker.
    pub fn new(
        config: BufferConfig,
        exporter: Arc<dyn MetricsExporter>,
    ) -> Result<Self, TracekitError> {
        let buffer = Arc::new(MetricsBuffer::new(config, exporter));
        buffer.start()?;

        Ok(Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            create_lock: Mutex::new(()),
            buffer,
        })
    }

    /// Creates a registry exporting OTLP/JSON to the configured metrics endpoint.
    pub fn otlp(config: &TracekitConfig) -> Result<Self, TracekitError> {
        let exporter = OtlpHttpExporter::new(
            config.metrics_endpoint(),
            config.api_key.clone(),
            config.service_name.clone(),
        )?;
        Self::new(config.metrics, Arc::new(exporter))
    }

    /// Returns the counter for `name` and `tags`, creating it on first use.
    pub fn counter(&self, name: &str, tags: &Tags) -> Arc<LiveCounter> {
        self.get_or_create(&self.counters, name, tags, |name, tags, buffer| {
            LiveCounter::new(name, tags, buffer)
        })
    }

    /// Returns the gauge for `name` and `tags`, creating it on first use.
    pub fn gauge(&self, name: &str, tags: &Tags) -> Arc<LiveGauge> {
        self.get_or_create(&self.gauges, name, tags, |name, tags, buffer| {
            LiveGauge::new(name, tags, buffer)
        })
    }

    /// Returns the histogram for `name` and `tags`, creating it on first use.
    pub fn histogram(&self, name: &str, tags: &Tags) -> Arc<LiveHistogram> {
        self.get_or_create(&self.histograms, name, tags, |name, tags, buffer| {
            LiveHistogram::new(name, tags, buffer)
        })
    }

    fn get_or_create<T>(
        &self,
        map: &InstrumentMap<T>,
        name: &str,
        tags: &Tags,
        make: impl FnOnce(String, Tags, Arc<MetricsBuffer>) -> T,
    ) -> Arc<T> {
        let key = metric_key(name, tags);

        if let Some(found) = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(found);
        }

        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(found) = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(found);
        }

        // The instrument owns its own copy of the tags
        let instrument = Arc::new(make(name.to_string(), tags.clone(), Arc::clone(&self.buffer)));
        map.write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&instrument));
        instrument
    }

    /// Total number of registered instruments across all kinds.
    pub fn instrument_count(&self) -> usize {
        fn len<T>(map: &InstrumentMap<T>) -> usize {
            map.read().unwrap_or_else(PoisonError::into_inner).len()
        }
        len(&self.counters) + len(&self.gauges) + len(&self.histograms)
    }

    pub fn buffer(&self) -> &Arc<MetricsBuffer> {
        &self.buffer
    }

    /// Shuts the buffer down, exporting whatever is pending.
    pub fn shutdown(&self) {
        self.buffer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::exporter::TestExporter;
    use crate::metrics::instruments::{Counter, Gauge, Histogram};
    use std::time::Duration;

    fn registry(exporter: Arc<TestExporter>) -> MetricsRegistry {
        let config = BufferConfig::default()
            .with_max_size(1_000)
            .with_flush_interval(Duration::from_secs(60));
        MetricsRegistry::new(config, exporter).unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn same_key_returns_same_instance() {
        let registry = registry(Arc::new(TestExporter::new()));
        let a = registry.counter("req", &tags(&[("a", "1"), ("b", "2")]));
        let b = registry.counter("req", &tags(&[("b", "2"), ("a", "1")]));
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.counter("req", &tags(&[("a", "1")]));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.instrument_count(), 2);
        registry.shutdown();
    }

    #[test]
    fn kinds_have_separate_namespaces() {
        let registry = registry(Arc::new(TestExporter::new()));
        registry.counter("x", &Tags::new());
        registry.gauge("x", &Tags::new());
        registry.histogram("x", &Tags::new());
        assert_eq!(registry.instrument_count(), 3);
        registry.shutdown();
    }

    #[test]
    fn caller_tag_map_is_copied() {
        let registry = registry(Arc::new(TestExporter::new()));
        let mut caller_tags = tags(&[("env", "prod")]);
        let gauge = registry.gauge("mem", &caller_tags);
        caller_tags.insert("env".into(), "dev".into());
        assert_eq!(gauge.tags()["env"], "prod");
        registry.shutdown();
    }

    #[test]
    fn shutdown_flushes_instrument_writes() {
        let exporter = Arc::new(TestExporter::new());
        let registry = registry(exporter.clone());

        registry.counter("req", &Tags::new()).inc();
        registry.gauge("mem", &Tags::new()).set(5.0);
        registry.histogram("latency", &Tags::new()).record(3.5);
        registry.shutdown();
        registry.shutdown();

        assert_eq!(exporter.batch_count(), 1);
        assert_eq!(exporter.all_points().len(), 3);
    }
}

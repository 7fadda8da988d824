//! Configuration for the client, the metrics buffer and endpoint resolution.

use crate::error::TracekitError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default collector host.
pub const DEFAULT_ENDPOINT: &str = "app.tracekit.dev";
/// Default path for trace export.
pub const DEFAULT_TRACES_PATH: &str = "/v1/traces";
/// Default path for metric export.
pub const DEFAULT_METRICS_PATH: &str = "/v1/metrics";

/// Configuration for the metrics buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of pending points that triggers a synchronous flush.
    ///
    /// Default: 100
    pub max_size: usize,

    /// Period of the background flush worker.
    ///
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Upper bound on how long `shutdown` waits for the worker to exit.
    ///
    /// Default: 2s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            flush_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl BufferConfig {
    /// Sets the size threshold.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the flush period.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the worker join timeout used at shutdown.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracekitConfig {
    /// API key sent as `X-API-Key`.
    pub api_key: String,
    /// Value of the `service.name` resource attribute.
    pub service_name: String,
    /// Collector host or full URL.
    pub endpoint: String,
    /// Scheme used when `endpoint` is a bare host.
    pub use_ssl: bool,
    /// Path appended to a bare host for trace export.
    pub traces_path: String,
    /// Path appended to a bare host for metric export.
    pub metrics_path: String,
    /// Master switch; a disabled client hands out no-op instruments.
    pub enabled: bool,
    /// Fraction of requests to trace, in `0.0..=1.0`.
    pub sample_rate: f64,
    /// Enables the snapshot capture collaborator.
    pub enable_code_monitoring: bool,
    /// Metrics buffer settings.
    pub metrics: BufferConfig,
}

impl Default for TracekitConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            service_name: "rust-app".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            use_ssl: true,
            traces_path: DEFAULT_TRACES_PATH.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            enabled: true,
            sample_rate: 1.0,
            enable_code_monitoring: false,
            metrics: BufferConfig::default(),
        }
    }
}

impl TracekitConfig {
    /// Creates a configuration with the given API key and defaults elsewhere.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the service name.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the collector endpoint (host or URL).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets whether bare hosts resolve to `https`.
    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Enables or disables the client.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the sampling rate.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Enables the snapshot capture collaborator.
    pub fn with_code_monitoring(mut self, enabled: bool) -> Self {
        self.enable_code_monitoring = enabled;
        self
    }

    /// Sets the metrics buffer configuration.
    pub fn with_metrics(mut self, metrics: BufferConfig) -> Self {
        self.metrics = metrics;
        self
    }

    /// Full URL metrics are posted to.
    pub fn metrics_endpoint(&self) -> String {
        resolve_endpoint(&self.endpoint, &self.metrics_path, self.use_ssl)
    }

    /// Full URL traces are posted to.
    ///
    /// Span export belongs to the injected tracing engine; this is the URL
    /// its exporter should be pointed at.
    pub fn traces_endpoint(&self) -> String {
        resolve_endpoint(&self.endpoint, &self.traces_path, self.use_ssl)
    }

    /// Base URL for the snapshot collaborator.
    pub fn snapshot_endpoint(&self) -> String {
        resolve_endpoint(&self.endpoint, "", self.use_ssl)
    }

    /// Checks the values the client relies on.
    pub fn validate(&self) -> Result<(), TracekitError> {
        if self.service_name.trim().is_empty() {
            return Err(TracekitError::InvalidConfig(
                "service_name must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(TracekitError::InvalidConfig(format!(
                "sample_rate must be within 0.0..=1.0, got {}",
                self.sample_rate
            )));
        }
        if self.metrics.max_size == 0 {
            return Err(TracekitError::InvalidConfig(
                "metrics.max_size must be at least 1".into(),
            ));
        }
        if self.metrics.flush_interval.is_zero() {
            return Err(TracekitError::InvalidConfig(
                "metrics.flush_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Resolves a configured endpoint into a full URL for `path`.
///
/// A bare host gets a scheme from `use_ssl` and `path` appended. A URL
/// without a path gets `path` appended and keeps its own scheme. A URL that
/// already carries a path is used as given, unless `path` is empty, in which
/// case the well-known export suffix is stripped to recover the base URL.
pub fn resolve_endpoint(endpoint: &str, path: &str, use_ssl: bool) -> String {
    let Some((scheme, rest)) = endpoint.split_once("://") else {
        let scheme = if use_ssl { "https" } else { "http" };
        let host = endpoint.trim_end_matches('/');
        return format!("{scheme}://{host}{path}");
    };

    let rest = rest.trim_end_matches('/');
    let trimmed = format!("{scheme}://{rest}");

    if rest.contains('/') {
        if path.is_empty() {
            extract_base_url(&trimmed)
        } else {
            trimmed
        }
    } else {
        format!("{trimmed}{path}")
    }
}

/// Strips a trailing export path (`/v1/traces`, `/api/v1/metrics`, ...) from a URL.
///
/// Strings without a scheme and URLs with any other path are returned unchanged.
pub fn extract_base_url(url: &str) -> String {
    const EXPORT_SUFFIXES: [&str; 4] = [
        "/api/v1/traces",
        "/api/v1/metrics",
        "/v1/traces",
        "/v1/metrics",
    ];

    if !url.contains("://") {
        return url.to_string();
    }

    EXPORT_SUFFIXES
        .iter()
        .find_map(|suffix| url.strip_suffix(suffix))
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_scheme_from_ssl_flag() {
        assert_eq!(
            resolve_endpoint("app.tracekit.dev", "/v1/traces", true),
            "https://app.tracekit.dev/v1/traces"
        );
        assert_eq!(
            resolve_endpoint("localhost:8081", "/v1/traces", false),
            "http://localhost:8081/v1/traces"
        );
        assert_eq!(
            resolve_endpoint("app.tracekit.dev/", "/v1/metrics", true),
            "https://app.tracekit.dev/v1/metrics"
        );
    }

    #[test]
    fn explicit_scheme_wins_over_ssl_flag() {
        assert_eq!(
            resolve_endpoint("http://localhost:8081", "/v1/traces", true),
            "http://localhost:8081/v1/traces"
        );
        assert_eq!(
            resolve_endpoint("https://app.tracekit.dev", "/v1/metrics", false),
            "https://app.tracekit.dev/v1/metrics"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8081/", "/v1/traces", true),
            "http://localhost:8081/v1/traces"
        );
    }

    #[test]
    fn full_urls_are_kept() {
        assert_eq!(
            resolve_endpoint("http://localhost:8081/v1/traces", "/v1/traces", true),
            "http://localhost:8081/v1/traces"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8081/custom/path", "/v1/traces", true),
            "http://localhost:8081/custom/path"
        );
        assert_eq!(
            resolve_endpoint("https://app.tracekit.dev/api/v2/", "/v1/traces", false),
            "https://app.tracekit.dev/api/v2"
        );
    }

    #[test]
    fn empty_path_yields_base_url() {
        assert_eq!(resolve_endpoint("app.tracekit.dev", "", true), "https://app.tracekit.dev");
        assert_eq!(resolve_endpoint("http://localhost:8081", "", true), "http://localhost:8081");
        assert_eq!(resolve_endpoint("http://localhost:8081/", "", true), "http://localhost:8081");
        assert_eq!(
            resolve_endpoint("http://localhost:8081/v1/traces", "", true),
            "http://localhost:8081"
        );
        assert_eq!(
            resolve_endpoint("https://app.tracekit.dev/v1/traces", "", false),
            "https://app.tracekit.dev"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8081/custom", "", true),
            "http://localhost:8081/custom"
        );
    }

    #[test]
    fn extract_base_url_strips_known_suffixes_only() {
        assert_eq!(extract_base_url("http://localhost:8081/v1/traces"), "http://localhost:8081");
        assert_eq!(extract_base_url("https://app.tracekit.dev/v1/metrics"), "https://app.tracekit.dev");
        assert_eq!(extract_base_url("https://app.tracekit.dev/api/v1/traces"), "https://app.tracekit.dev");
        assert_eq!(extract_base_url("https://app.tracekit.dev/api/v1/metrics"), "https://app.tracekit.dev");
        assert_eq!(extract_base_url("http://localhost:8081/custom"), "http://localhost:8081/custom");
        assert_eq!(extract_base_url("http://localhost:8081/api"), "http://localhost:8081/api");
        assert_eq!(extract_base_url("https://app.tracekit.dev"), "https://app.tracekit.dev");
        assert_eq!(extract_base_url("app.tracekit.dev/v1/traces"), "app.tracekit.dev/v1/traces");
    }

    #[test]
    fn config_endpoints_follow_resolution() {
        let config = TracekitConfig::new("key").with_endpoint("localhost:8080").with_ssl(false);
        assert_eq!(config.traces_endpoint(), "http://localhost:8080/v1/traces");
        assert_eq!(config.metrics_endpoint(), "http://localhost:8080/v1/metrics");
        assert_eq!(config.snapshot_endpoint(), "http://localhost:8080");
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(TracekitConfig::new("key").validate().is_ok());
        assert!(TracekitConfig::new("key").with_sample_rate(1.5).validate().is_err());
        assert!(TracekitConfig::new("key").with_service_name(" ").validate().is_err());
        let zero = BufferConfig::default().with_max_size(0);
        assert!(TracekitConfig::new("key").with_metrics(zero).validate().is_err());
        let never = BufferConfig::default().with_flush_interval(Duration::ZERO);
        assert!(TracekitConfig::new("key").with_metrics(never).validate().is_err());
    }

    #[test]
    fn deserializes_with_humantime_durations() {
        let config: TracekitConfig = serde_json::from_str(
            r#"{"api_key":"k","service_name":"svc","metrics":{"max_size":50,"flush_interval":"500ms"}}"#,
        )
        .unwrap();
        assert_eq!(config.service_name, "svc");
        assert_eq!(config.metrics.max_size, 50);
        assert_eq!(config.metrics.flush_interval, Duration::from_millis(500));
        assert_eq!(config.metrics.shutdown_timeout, Duration::from_secs(2));
        assert!(config.enabled);
    }
}

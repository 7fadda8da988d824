use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracekit::metrics::MetricKind;
use tracekit::{
    BufferConfig, Counter, ExportError, MetricDataPoint, MetricsExporter, MetricsRegistry,
    OtlpHttpExporter, Tags,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn points() -> Vec<MetricDataPoint> {
    let mut tags = Tags::new();
    tags.insert("route".into(), "/cart".into());
    vec![
        MetricDataPoint::at("req", tags.clone(), 1.0, 1_700_000_000.0, MetricKind::Counter),
        MetricDataPoint::at("mem", Tags::new(), 512.0, 1_700_000_000.0, MetricKind::Gauge),
        MetricDataPoint::at("req", tags, 2.0, 1_700_000_001.0, MetricKind::Counter),
    ]
}

/// Runs an export against `endpoint` on the blocking pool.
async fn export_to(endpoint: String, points: Vec<MetricDataPoint>) -> Result<(), ExportError> {
    tokio::task::spawn_blocking(move || {
        let exporter = OtlpHttpExporter::new(endpoint, "secret-key", "checkout")?;
        exporter.export(points)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn posts_otlp_json_with_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/metrics"))
        .and(header("content-type", "application/json"))
        .and(header("x-api-key", "secret-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    export_to(format!("{}/v1/metrics", mock_server.uri()), points())
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: Value = received[0].body_json().unwrap();

    let resource = &body["resourceMetrics"][0];
    assert_eq!(
        resource["resource"]["attributes"][0],
        serde_json::json!({"key": "service.name", "value": {"stringValue": "checkout"}})
    );

    let scope = &resource["scopeMetrics"][0];
    assert_eq!(scope["scope"]["name"], "tracekit");

    let metrics = scope["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);

    assert_eq!(metrics[0]["name"], "req");
    let sum = &metrics[0]["sum"];
    assert_eq!(sum["isMonotonic"], true);
    assert_eq!(sum["aggregationTemporality"], 2);
    assert_eq!(sum["dataPoints"].as_array().unwrap().len(), 2);
    assert_eq!(sum["dataPoints"][0]["timeUnixNano"], "1700000000000000000");
    assert_eq!(sum["dataPoints"][1]["asDouble"], 2.0);
    assert_eq!(
        sum["dataPoints"][0]["attributes"][0],
        serde_json::json!({"key": "route", "value": {"stringValue": "/cart"}})
    );

    assert_eq!(metrics[1]["name"], "mem");
    assert_eq!(metrics[1]["gauge"]["dataPoints"][0]["asDouble"], 512.0);
    assert!(metrics[1].get("sum").is_none());
}

#[tokio::test]
async fn non_200_is_a_status_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/metrics"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let err = export_to(format!("{}/v1/metrics", mock_server.uri()), points())
        .await
        .unwrap_err();
    assert_eq!(err, ExportError::Status(401));
    assert!(err.is_rejected());
}

#[tokio::test]
async fn accepted_but_not_200_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let err = export_to(format!("{}/v1/metrics", mock_server.uri()), points())
        .await
        .unwrap_err();
    assert_eq!(err, ExportError::Status(202));
}

#[tokio::test]
async fn empty_batch_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    export_to(format!("{}/v1/metrics", mock_server.uri()), Vec::new())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn size_flush_from_async_task_reaches_collector() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/metrics"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Built and used directly on runtime threads, as a web service would.
    let exporter = OtlpHttpExporter::new(
        format!("{}/v1/metrics", mock_server.uri()),
        "secret-key",
        "checkout",
    )
    .unwrap();
    let config = BufferConfig::default()
        .with_max_size(1)
        .with_flush_interval(Duration::from_secs(60));
    let registry = Arc::new(MetricsRegistry::new(config, Arc::new(exporter)).unwrap());

    let producer = Arc::clone(&registry);
    tokio::spawn(async move { producer.counter("req", &Tags::new()).inc() })
        .await
        .unwrap();

    let stats = registry.buffer().stats();
    assert_eq!(stats.points_exported(), 1);
    assert_eq!(stats.export_errors(), 0);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);

    registry.shutdown();
}

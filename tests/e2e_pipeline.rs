//! End-to-end: pipeline → HttpExporter → mock sink.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use telepipe::{
    HttpExporter, LogRecord, MetricPoint, Pipeline, PipelineConfig, Resource, Severity, SinkConfig,
    Span, SpanId, TraceId,
};

fn test_config(endpoint: &str) -> PipelineConfig {
    PipelineConfig {
        buffer_capacity: 64,
        max_batch_size: 16,
        // Long enough that only explicit flushes fire during the test
        flush_interval_ms: 60_000,
        retry: telepipe::RetryConfig {
            base_delay_ms: 10,
            max_delay_ms: 100,
            max_attempts: 5,
        },
        sink: SinkConfig {
            endpoint: endpoint.to_string(),
            ..SinkConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn build_pipeline(config: &PipelineConfig) -> Arc<Pipeline> {
    let exporter = Arc::new(HttpExporter::new(&config.sink).expect("exporter builds"));
    let resource = Resource::new("e2e-service").with("deployment.environment", "testing");
    let pipeline = Arc::new(Pipeline::new(config, resource, exporter));
    pipeline.start();
    pipeline
}

#[tokio::test]
async fn pipeline_delivers_every_kind_to_the_sink() {
    if !helpers::can_bind_loopback().await {
        eprintln!("skipping: loopback bind not permitted");
        return;
    }
    let (sink, base_url) = helpers::spawn_mock_sink().await;
    let client = Client::new();
    helpers::wait_for_health(&client, &base_url).await;

    let config = test_config(&base_url);
    let pipeline = build_pipeline(&config);

    let mut span = Span::start(TraceId::random(), SpanId::random(), "main-operation");
    span.set_attribute("operation.type", "test");
    span.end();
    pipeline.submit_span(span).unwrap();
    pipeline
        .submit_metric(MetricPoint::counter("requests.total", 1.0))
        .unwrap();
    pipeline
        .submit_log(LogRecord::new(Severity::Info, "request handled"))
        .unwrap();

    pipeline.force_flush(Duration::from_secs(10)).await.unwrap();

    let events = helpers::wait_for_events(&client, &base_url, 3).await;
    let mut kinds: Vec<_> = events
        .iter()
        .map(|e| e["kind"].as_str().unwrap_or_default().to_string())
        .collect();
    kinds.sort();
    assert_eq!(kinds, vec!["log", "metric", "span"]);
    for event in &events {
        assert_eq!(event["resource"]["service.name"], "e2e-service");
    }

    let stats = pipeline.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.exported_records, 3);

    pipeline.shutdown(Duration::from_secs(5)).await.unwrap();
    sink.stop().await;
}

#[tokio::test]
async fn transient_sink_failures_are_retried_until_delivered() {
    if !helpers::can_bind_loopback().await {
        eprintln!("skipping: loopback bind not permitted");
        return;
    }
    let (sink, base_url) = helpers::spawn_mock_sink().await;
    let client = Client::new();
    helpers::wait_for_health(&client, &base_url).await;

    let config = test_config(&base_url);
    let pipeline = build_pipeline(&config);

    sink.fail_next(2);
    pipeline
        .submit_log(LogRecord::new(Severity::Warn, "flaky delivery"))
        .unwrap();
    pipeline.force_flush(Duration::from_secs(10)).await.unwrap();

    let events = helpers::wait_for_events(&client, &base_url, 1).await;
    assert_eq!(events[0]["message"], "flaky delivery");

    let stats = pipeline.stats();
    assert_eq!(stats.exported_records, 1);
    assert_eq!(stats.export_attempt_failures, 2);
    assert_eq!(stats.dropped_fatal, 0);

    pipeline.shutdown(Duration::from_secs(5)).await.unwrap();
    sink.stop().await;
}

#[tokio::test]
async fn shutdown_drains_buffered_records() {
    if !helpers::can_bind_loopback().await {
        eprintln!("skipping: loopback bind not permitted");
        return;
    }
    let (sink, base_url) = helpers::spawn_mock_sink().await;
    let client = Client::new();
    helpers::wait_for_health(&client, &base_url).await;

    let config = test_config(&base_url);
    let pipeline = build_pipeline(&config);

    for i in 0..5 {
        pipeline
            .submit_log(LogRecord::new(Severity::Info, format!("line {}", i)))
            .unwrap();
    }
    pipeline.shutdown(Duration::from_secs(10)).await.unwrap();

    let events = helpers::current_events(&client, &base_url).await;
    assert_eq!(events.len(), 5);
    assert_eq!(events[0]["message"], "line 0");
    assert_eq!(events[4]["message"], "line 4");

    assert!(pipeline
        .submit_log(LogRecord::new(Severity::Info, "too late"))
        .is_err());

    sink.stop().await;
}

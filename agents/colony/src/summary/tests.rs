use std::sync::Arc;

use colony_core::{
    BeylaHttpSummary, LatencyHistogram, MetricKind, SpanKind, SystemMetricSummary,
    TelemetrySummary,
};
use colony_test::mocks::MockSummaryStore;

use super::*;

fn http_summary(service: &str, status: u16, count: u64, bucket_ms: f64) -> BeylaHttpSummary {
    let mut histogram = LatencyHistogram::default();
    histogram.add(bucket_ms, count);
    BeylaHttpSummary {
        service: service.into(),
        method: "GET".into(),
        route: "/".into(),
        status_code: status,
        histogram,
        request_count: count,
    }
}

fn otlp_summary(service: &str, spans: u64, errors: u64, p95: f64) -> TelemetrySummary {
    TelemetrySummary {
        agent_id: "a1".into(),
        bucket_minute: 0,
        service: service.into(),
        kind: SpanKind::Server,
        p50_ms: p95 / 2.0,
        p95_ms: p95,
        p99_ms: p95,
        total_spans: spans,
        error_count: errors,
        sample_trace_ids: vec![],
    }
}

fn cpu_metric(agent: &str, max: f64) -> SystemMetricSummary {
    SystemMetricSummary {
        bucket_minute: 0,
        agent_id: agent.into(),
        metric_name: "system.cpu.utilization".into(),
        attributes_json: "{}".into(),
        kind: MetricKind::Gauge,
        min: max / 2.0,
        max,
        avg: max / 2.0,
        p95: max,
        delta: 0.0,
        sample_count: 10,
    }
}

fn quiet_profiling(mock: &mut MockSummaryStore) {
    mock.expect__top_k_hotspots()
        .returning(|_, _, _, _, _, _| Ok((0, vec![])));
}

fn no_versions(mock: &mut MockSummaryStore) {
    mock.expect__binary_versions().returning(|_| Ok(vec![]));
}

#[tokio::test]
async fn seeds_from_ebpf_and_merges_otlp() {
    let mut mock = MockSummaryStore::new();
    mock.expect__beyla_http_summaries().returning(|_, _, _| {
        Ok(vec![
            http_summary("checkout", 200, 90, 100.0),
            http_summary("checkout", 500, 10, 100.0),
        ])
    });
    mock.expect__telemetry_summaries()
        .returning(|_, _, _| Ok(vec![otlp_summary("checkout", 100, 0, 300.0)]));
    mock.expect__system_metric_summaries()
        .returning(|_, _| Ok(vec![]));
    mock.expect__registered_services().returning(|| Ok(vec![]));
    quiet_profiling(&mut mock);
    no_versions(&mut mock);

    let engine = UnifiedQueryEngine::new(Arc::new(mock), SummaryConfig::default());
    let summaries = engine.unified_summaries_at(None, 0, 600, 600).await.unwrap();

    assert_eq!(summaries.len(), 1);
    let s = &summaries[0];
    assert_eq!(s.source, "eBPF+OTLP");
    // 100 ebpf requests + 100 otlp spans; 10 ebpf 5xx errors.
    assert_eq!(s.request_count, 200);
    assert_eq!(s.error_count, 10);
    assert!((s.error_rate - 0.05).abs() < 1e-9);
    // mean of ebpf bucket mean (100) and otlp p95 mean (300)
    assert!((s.mean_latency_ms - 200.0).abs() < 1e-9);
    assert_eq!(s.status, ServiceStatus::Degraded);
}

#[tokio::test]
async fn otlp_only_services_are_inserted() {
    let mut mock = MockSummaryStore::new();
    mock.expect__beyla_http_summaries()
        .returning(|_, _, _| Ok(vec![]));
    mock.expect__telemetry_summaries()
        .returning(|_, _, _| Ok(vec![otlp_summary("billing", 50, 0, 20.0)]));
    mock.expect__system_metric_summaries()
        .returning(|_, _| Ok(vec![]));
    mock.expect__registered_services().returning(|| Ok(vec![]));
    quiet_profiling(&mut mock);
    no_versions(&mut mock);

    let engine = UnifiedQueryEngine::new(Arc::new(mock), SummaryConfig::default());
    let summaries = engine.unified_summaries_at(None, 0, 600, 600).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].source, "OTLP");
    assert_eq!(summaries[0].status, ServiceStatus::Healthy);
}

#[tokio::test]
async fn idle_services_appear_and_host_pressure_degrades() {
    let mut mock = MockSummaryStore::new();
    mock.expect__beyla_http_summaries()
        .returning(|_, _, _| Ok(vec![]));
    mock.expect__telemetry_summaries()
        .returning(|_, _, _| Ok(vec![]));
    mock.expect__system_metric_summaries()
        .returning(|_, _| Ok(vec![cpu_metric("a1", 0.95)]));
    mock.expect__registered_services()
        .returning(|| Ok(vec![("idle-svc".into(), "a1".into())]));
    quiet_profiling(&mut mock);
    no_versions(&mut mock);

    let engine = UnifiedQueryEngine::new(Arc::new(mock), SummaryConfig::default());
    let summaries = engine.unified_summaries_at(None, 0, 600, 600).await.unwrap();

    assert_eq!(summaries.len(), 1);
    let s = &summaries[0];
    assert_eq!(s.service_name, "idle-svc");
    assert_eq!(s.source, "none");
    // Idle upgraded to degraded by cpu pressure, with an issue string.
    assert_eq!(s.status, ServiceStatus::Degraded);
    assert_eq!(s.cpu_utilization_max, Some(0.95));
    assert!(!s.issues.is_empty());
}

#[tokio::test]
async fn output_is_sorted_by_service_name() {
    let mut mock = MockSummaryStore::new();
    mock.expect__beyla_http_summaries().returning(|_, _, _| {
        Ok(vec![
            http_summary("zeta", 200, 1, 1.0),
            http_summary("alpha", 200, 1, 1.0),
            http_summary("mid", 200, 1, 1.0),
        ])
    });
    mock.expect__telemetry_summaries()
        .returning(|_, _, _| Ok(vec![]));
    mock.expect__system_metric_summaries()
        .returning(|_, _| Ok(vec![]));
    mock.expect__registered_services().returning(|| Ok(vec![]));
    quiet_profiling(&mut mock);
    no_versions(&mut mock);

    let engine = UnifiedQueryEngine::new(Arc::new(mock), SummaryConfig::default());
    let summaries = engine.unified_summaries_at(None, 0, 600, 600).await.unwrap();

    let names: Vec<_> = summaries.iter().map(|s| s.service_name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn profiling_enrichment_respects_the_sample_floor() {
    use colony_core::Hotspot;

    let mut mock = MockSummaryStore::new();
    mock.expect__beyla_http_summaries()
        .returning(|_, _, _| Ok(vec![http_summary("checkout", 200, 10, 5.0)]));
    mock.expect__telemetry_summaries()
        .returning(|_, _, _| Ok(vec![]));
    mock.expect__system_metric_summaries()
        .returning(|_, _| Ok(vec![]));
    mock.expect__registered_services().returning(|| Ok(vec![]));
    mock.expect__top_k_hotspots()
        .returning(|kind, _, _, _, _, _| match kind {
            ProfileKind::Cpu => Ok((
                500,
                vec![Hotspot {
                    rank: 1,
                    frames: vec!["leaf".into(), "main".into()],
                    percentage: 100.0,
                    sample_count: 500,
                }],
            )),
            // Below the 1 MiB allocation floor.
            ProfileKind::Memory => Ok((
                100,
                vec![Hotspot {
                    rank: 1,
                    frames: vec!["alloc".into()],
                    percentage: 100.0,
                    sample_count: 100,
                }],
            )),
        });
    no_versions(&mut mock);

    let engine = UnifiedQueryEngine::new(Arc::new(mock), SummaryConfig::default());
    let summaries = engine.unified_summaries_at(None, 0, 600, 600).await.unwrap();

    let s = &summaries[0];
    let cpu = s.cpu_profile.as_ref().expect("cpu insight present");
    assert_eq!(cpu.hot_path, vec!["main", "leaf"]);
    assert!(s.memory_profile.is_none());
}

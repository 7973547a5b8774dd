//! Builders for the fixtures the poller and aggregator tests keep reaching
//! for.

use time::OffsetDateTime;

use colony_core::{
    AgentEntry, MemorySample, ServiceInfo, SpanKind, SpanRecord, StackFrame, SystemMetricRecord,
};

/// A registry entry that is healthy right now.
pub fn healthy_agent(agent_id: &str) -> AgentEntry {
    AgentEntry {
        agent_id: agent_id.into(),
        mesh_ipv4: "10.8.0.2".parse().unwrap(),
        last_seen: OffsetDateTime::now_utc(),
        services: vec![ServiceInfo {
            name: "checkout".into(),
            binary_hash: Some("bld-1".into()),
            language: Some("go".into()),
            pid: Some(4242),
        }],
        runtime_context: serde_json::json!({ "arch": "x86_64" }),
    }
}

/// `count` server spans for one service, seq-ids starting at `first_seq`,
/// all stamped `timestamp`.
pub fn spans(service: &str, first_seq: u64, count: u64, timestamp: i64) -> Vec<SpanRecord> {
    (0..count)
        .map(|i| SpanRecord {
            seq_id: first_seq + i,
            timestamp,
            trace_id: format!("trace-{}", first_seq + i),
            span_id: format!("span-{}", first_seq + i),
            service: service.into(),
            kind: SpanKind::Server,
            duration_ms: 10.0 * (i + 1) as f64,
            error: false,
            http_method: None,
            http_route: None,
            http_status_code: None,
        })
        .collect()
}

/// A gauge metric point.
pub fn gauge_metric(seq_id: u64, timestamp: i64, name: &str, value: f64) -> SystemMetricRecord {
    SystemMetricRecord {
        seq_id,
        timestamp,
        name: name.into(),
        value,
        unit: "1".into(),
        kind: colony_core::MetricKind::Gauge,
        attributes: serde_json::json!({}),
    }
}

/// A two-frame allocation sample.
pub fn memory_sample(seq_id: u64, timestamp: i64, service: &str, bytes: u64) -> MemorySample {
    MemorySample {
        seq_id,
        timestamp,
        service: service.into(),
        build_id: "bld-1".into(),
        stack_frames: vec![
            StackFrame {
                function: "alloc_buffer".into(),
                module: "checkout/cache".into(),
                file: "cache.go".into(),
                line: 88,
            },
            StackFrame {
                function: "handle_request".into(),
                module: "checkout/http".into(),
                file: "handler.go".into(),
                line: 31,
            },
        ],
        alloc_bytes: bytes,
        alloc_objects: bytes / 64,
    }
}

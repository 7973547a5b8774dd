use serde::{Deserialize, Serialize};

/// Span kind as reported by the agent's OTLP receiver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Server-side handling of a request.
    Server,
    /// Outbound call made by the service.
    Client,
    /// Message producer.
    Producer,
    /// Message consumer.
    Consumer,
    /// Everything else.
    #[default]
    #[serde(other)]
    Internal,
}

impl SpanKind {
    /// Stable string key used in aggregate tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Server => "server",
            SpanKind::Client => "client",
            SpanKind::Producer => "producer",
            SpanKind::Consumer => "consumer",
            SpanKind::Internal => "internal",
        }
    }
}

/// One captured telemetry span, as persisted in the agent's local store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Per-session sequence id assigned by the agent.
    pub seq_id: u64,
    /// Span end time, unix seconds.
    pub timestamp: i64,
    /// Trace the span belongs to.
    pub trace_id: String,
    /// Span identity within the trace.
    pub span_id: String,
    /// Owning service.
    pub service: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Span duration in milliseconds.
    pub duration_ms: f64,
    /// Whether the span ended with an error status.
    pub error: bool,
    /// HTTP method, when the span is an HTTP span.
    #[serde(default)]
    pub http_method: Option<String>,
    /// HTTP route template, when known.
    #[serde(default)]
    pub http_route: Option<String>,
    /// HTTP response status code, when known.
    #[serde(default)]
    pub http_status_code: Option<u16>,
}

/// eBPF HTTP metric row, already latency-bucketed at source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaHttpMetric {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Last time the row was touched on the agent, unix seconds.
    pub last_seen: i64,
    /// Owning service.
    pub service: String,
    /// Request method.
    pub method: String,
    /// Route template.
    pub route: String,
    /// Response status code.
    pub status_code: u16,
    /// Upper bound of the latency bucket this row counts, milliseconds.
    pub latency_bucket_ms: f64,
    /// Requests observed in the bucket.
    pub count: u64,
}

/// eBPF gRPC metric row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaGrpcMetric {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Last touch on the agent, unix seconds.
    pub last_seen: i64,
    /// Owning service.
    pub service: String,
    /// Fully qualified method.
    pub method: String,
    /// gRPC status code.
    pub status_code: i32,
    /// Upper bound of the latency bucket, milliseconds.
    pub latency_bucket_ms: f64,
    /// Calls observed in the bucket.
    pub count: u64,
}

/// eBPF SQL metric row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaSqlMetric {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Last touch on the agent, unix seconds.
    pub last_seen: i64,
    /// Owning service.
    pub service: String,
    /// Statement operation (SELECT, INSERT, ...).
    pub operation: String,
    /// Primary table of the statement, when the parser found one.
    pub table: String,
    /// Upper bound of the latency bucket, milliseconds.
    pub latency_bucket_ms: f64,
    /// Statements observed in the bucket.
    pub count: u64,
}

/// eBPF-captured trace span, stored raw for fleet-wide trace assembly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Trace the span belongs to.
    pub trace_id: String,
    /// Span identity.
    pub span_id: String,
    /// Parent span, empty for roots.
    #[serde(default)]
    pub parent_span_id: Option<String>,
    /// Owning service.
    pub service: String,
    /// Operation name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Start time, unix microseconds.
    pub start_time_us: i64,
    /// Duration in microseconds.
    pub duration_us: u64,
    /// Status code (0 unset, 1 ok, 2 error).
    pub status: i32,
}

/// One frame of a profile stack, as symbolized on the agent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    /// Function name.
    pub function: String,
    /// Module / package the function lives in.
    #[serde(default)]
    pub module: String,
    /// Source file, when DWARF was available.
    #[serde(default)]
    pub file: String,
    /// Line number, 0 when unknown.
    #[serde(default)]
    pub line: u32,
}

/// A heap allocation profile sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Sample time, unix seconds.
    pub timestamp: i64,
    /// Owning service.
    pub service: String,
    /// Binary the stack was symbolized against.
    pub build_id: String,
    /// Leaf-first call stack.
    pub stack_frames: Vec<StackFrame>,
    /// Bytes attributed to the stack.
    pub alloc_bytes: u64,
    /// Objects attributed to the stack.
    pub alloc_objects: u64,
}

/// Metric type of a host system metric.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value.
    #[default]
    Gauge,
    /// Monotone cumulative value.
    Counter,
    /// Pre-computed difference.
    Delta,
}

impl MetricKind {
    /// Whether a min/max difference is meaningful for this kind.
    pub fn has_delta(&self) -> bool {
        matches!(self, MetricKind::Counter | MetricKind::Delta)
    }

    /// Stable string key used in aggregate tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Delta => "delta",
        }
    }
}

/// One host system metric point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricRecord {
    /// Per-session sequence id.
    pub seq_id: u64,
    /// Observation time, unix seconds.
    pub timestamp: i64,
    /// Metric name, e.g. `system.cpu.utilization`.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Unit string as reported.
    #[serde(default)]
    pub unit: String,
    /// Metric type.
    #[serde(default)]
    pub kind: MetricKind,
    /// Dimension attributes.
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Truncate a unix-seconds timestamp to the start of its UTC minute.
pub fn bucket_minute(timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(60)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bucket_minute_truncates() {
        assert_eq!(bucket_minute(0), 0);
        assert_eq!(bucket_minute(59), 0);
        assert_eq!(bucket_minute(60), 60);
        assert_eq!(bucket_minute(1_700_000_123), 1_700_000_100);
    }

    #[test]
    fn span_kind_falls_back_to_internal() {
        let kind: SpanKind = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(kind, SpanKind::Internal);
    }
}

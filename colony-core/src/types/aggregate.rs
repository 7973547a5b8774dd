use serde::{Deserialize, Serialize};

use super::record::{MetricKind, SpanKind};

/// At most this many sample trace-ids are kept per telemetry summary row.
pub const MAX_SAMPLE_TRACE_IDS: usize = 5;

/// One-minute roll-up of telemetry spans for `(agent, bucket, service, kind)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Agent the spans came from.
    pub agent_id: String,
    /// UTC minute the spans fell into, unix seconds.
    pub bucket_minute: i64,
    /// Owning service.
    pub service: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Median duration, milliseconds.
    pub p50_ms: f64,
    /// 95th percentile duration.
    pub p95_ms: f64,
    /// 99th percentile duration.
    pub p99_ms: f64,
    /// Spans observed in the bucket.
    pub total_spans: u64,
    /// Spans that ended with an error status.
    pub error_count: u64,
    /// Up to [`MAX_SAMPLE_TRACE_IDS`] example trace ids.
    pub sample_trace_ids: Vec<String>,
}

/// Source-bucketed latency histogram carried by the eBPF summaries.
/// Buckets are upper bounds in milliseconds; never re-bucketed colony-side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyHistogram {
    /// Bucket upper bounds, ascending, milliseconds.
    pub buckets: Vec<f64>,
    /// Observation count per bucket.
    pub counts: Vec<u64>,
}

impl LatencyHistogram {
    /// Fold one `(bucket, count)` pair in, preserving source bucket bounds.
    pub fn add(&mut self, bucket_ms: f64, count: u64) {
        match self
            .buckets
            .iter()
            .position(|b| (*b - bucket_ms).abs() < f64::EPSILON || *b > bucket_ms)
        {
            Some(i) if (self.buckets[i] - bucket_ms).abs() < f64::EPSILON => {
                self.counts[i] += count;
            }
            Some(i) => {
                self.buckets.insert(i, bucket_ms);
                self.counts.insert(i, count);
            }
            None => {
                self.buckets.push(bucket_ms);
                self.counts.push(count);
            }
        }
    }

    /// Merge another histogram in, bucket by bucket.
    pub fn merge(&mut self, other: &LatencyHistogram) {
        for (bucket, count) in other.buckets.iter().zip(other.counts.iter()) {
            self.add(*bucket, *count);
        }
    }

    /// Total observations across buckets.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Count-weighted mean of the bucket upper bounds. A coarse latency
    /// signal, but the only one available without re-bucketing.
    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .buckets
            .iter()
            .zip(self.counts.iter())
            .map(|(b, c)| b * *c as f64)
            .sum();
        weighted / total as f64
    }
}

/// Aggregated eBPF HTTP metrics for `(service, method, route, status)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaHttpSummary {
    /// Owning service.
    pub service: String,
    /// Request method.
    pub method: String,
    /// Route template.
    pub route: String,
    /// Response status code.
    pub status_code: u16,
    /// Merged latency histogram.
    pub histogram: LatencyHistogram,
    /// Total requests.
    pub request_count: u64,
}

/// Aggregated eBPF gRPC metrics for `(service, method, status)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaGrpcSummary {
    /// Owning service.
    pub service: String,
    /// Fully qualified method.
    pub method: String,
    /// gRPC status code.
    pub status_code: i32,
    /// Merged latency histogram.
    pub histogram: LatencyHistogram,
    /// Total calls.
    pub request_count: u64,
}

/// Aggregated eBPF SQL metrics for `(service, operation, table)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeylaSqlSummary {
    /// Owning service.
    pub service: String,
    /// Statement operation.
    pub operation: String,
    /// Primary table.
    pub table: String,
    /// Merged latency histogram.
    pub histogram: LatencyHistogram,
    /// Total statements.
    pub request_count: u64,
}

/// One-minute roll-up of a host system metric for
/// `(bucket, agent, metric, attributes)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricSummary {
    /// UTC minute, unix seconds.
    pub bucket_minute: i64,
    /// Agent the metric came from.
    pub agent_id: String,
    /// Metric name.
    pub metric_name: String,
    /// Canonical JSON encoding of the attribute set.
    pub attributes_json: String,
    /// Metric type observed for the bucket.
    pub kind: MetricKind,
    /// Smallest observation.
    pub min: f64,
    /// Largest observation.
    pub max: f64,
    /// Mean observation.
    pub avg: f64,
    /// 95th percentile, linear interpolation on sorted values.
    pub p95: f64,
    /// `max - min` for counter/delta metrics, 0 otherwise.
    pub delta: f64,
    /// Observations in the bucket.
    pub sample_count: u64,
}

/// One-minute roll-up of memory-profile samples for
/// `(bucket, agent, service, build, stack)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryProfileSummary {
    /// UTC minute, unix seconds.
    pub bucket_minute: i64,
    /// Agent the samples came from.
    pub agent_id: String,
    /// Owning service.
    pub service: String,
    /// Binary the stacks were symbolized against.
    pub build_id: String,
    /// Hash over the interned frame-id sequence.
    pub stack_hash: String,
    /// Interned frame ids, leaf first.
    pub frame_ids: Vec<i64>,
    /// Bytes attributed to the stack in the bucket.
    pub alloc_bytes: u64,
    /// Objects attributed to the stack in the bucket.
    pub alloc_objects: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn histogram_merges_without_rebucketing() {
        let mut h = LatencyHistogram::default();
        h.add(10.0, 3);
        h.add(100.0, 1);
        h.add(10.0, 2);
        h.add(50.0, 4);

        assert_eq!(h.buckets, vec![10.0, 50.0, 100.0]);
        assert_eq!(h.counts, vec![5, 4, 1]);
        assert_eq!(h.total(), 10);
    }

    #[test]
    fn histogram_mean_is_count_weighted() {
        let mut h = LatencyHistogram::default();
        h.add(10.0, 1);
        h.add(30.0, 3);
        assert!((h.mean() - 25.0).abs() < f64::EPSILON);
        assert_eq!(LatencyHistogram::default().mean(), 0.0);
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use colony_core::{bucket_minute, SpanKind, SpanRecord, TelemetrySummary, MAX_SAMPLE_TRACE_IDS};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct BucketKey {
    agent_id: String,
    bucket_minute: i64,
    service: String,
    kind: SpanKind,
}

#[derive(Debug, Default)]
struct Bucket {
    durations_ms: Vec<f64>,
    error_count: u64,
    sample_trace_ids: Vec<String>,
}

/// Rolls telemetry spans up into one-minute buckets keyed by
/// `(agent, bucket, service, kind)`.
///
/// A fresh instance is created per poll cycle and discarded after
/// `get_summaries`; nothing shares it, the lock only covers the aggregation
/// fold itself.
#[derive(Debug, Default)]
pub struct TelemetryAggregator {
    buckets: Mutex<HashMap<BucketKey, Bucket>>,
}

impl TelemetryAggregator {
    /// Empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one span in.
    pub fn add_span(&self, agent_id: &str, span: &SpanRecord) {
        let key = BucketKey {
            agent_id: agent_id.into(),
            bucket_minute: bucket_minute(span.timestamp),
            service: span.service.clone(),
            kind: span.kind,
        };

        let mut buckets = self.buckets.lock().expect("aggregator lock poisoned");
        let bucket = buckets.entry(key).or_default();
        bucket.durations_ms.push(span.duration_ms);
        if span.error {
            bucket.error_count += 1;
        }
        if bucket.sample_trace_ids.len() < MAX_SAMPLE_TRACE_IDS && !span.trace_id.is_empty() {
            bucket.sample_trace_ids.push(span.trace_id.clone());
        }
    }

    /// Drain the buckets into summary rows. Percentiles are index-based on
    /// the sorted durations: p50 at `⌊n·0.50⌋`, p95 and p99 clamped to the
    /// last element.
    pub fn get_summaries(&self) -> Vec<TelemetrySummary> {
        let buckets = self.buckets.lock().expect("aggregator lock poisoned");
        let mut summaries: Vec<TelemetrySummary> = buckets
            .iter()
            .map(|(key, bucket)| {
                let mut durations = bucket.durations_ms.clone();
                durations.sort_by(|a, b| a.partial_cmp(b).expect("durations are finite"));
                let n = durations.len();

                TelemetrySummary {
                    agent_id: key.agent_id.clone(),
                    bucket_minute: key.bucket_minute,
                    service: key.service.clone(),
                    kind: key.kind,
                    p50_ms: durations[n * 50 / 100],
                    p95_ms: durations[(n * 95 / 100).min(n - 1)],
                    p99_ms: durations[(n * 99 / 100).min(n - 1)],
                    total_spans: n as u64,
                    error_count: bucket.error_count,
                    sample_trace_ids: bucket.sample_trace_ids.clone(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            (&a.agent_id, a.bucket_minute, &a.service, a.kind.as_str()).cmp(&(
                &b.agent_id,
                b.bucket_minute,
                &b.service,
                b.kind.as_str(),
            ))
        });
        summaries
    }

    /// Reset all buckets.
    pub fn clear(&self) {
        self.buckets
            .lock()
            .expect("aggregator lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn span(service: &str, ts: i64, duration_ms: f64, error: bool) -> SpanRecord {
        SpanRecord {
            seq_id: 0,
            timestamp: ts,
            trace_id: format!("t-{duration_ms}"),
            span_id: "s".into(),
            service: service.into(),
            kind: SpanKind::Server,
            duration_ms,
            error,
            http_method: None,
            http_route: None,
            http_status_code: None,
        }
    }

    #[test]
    fn percentile_indices_match_definition() {
        let agg = TelemetryAggregator::new();
        for d in [50.0, 10.0, 30.0, 20.0, 40.0] {
            agg.add_span("a1", &span("checkout", 60, d, false));
        }

        let summaries = agg.get_summaries();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        // sorted: [10, 20, 30, 40, 50]; p50 idx 2, p95 idx 4, p99 idx 4
        assert_eq!(s.p50_ms, 30.0);
        assert_eq!(s.p95_ms, 50.0);
        assert_eq!(s.p99_ms, 50.0);
        assert_eq!(s.total_spans, 5);
        assert_eq!(s.bucket_minute, 60);
    }

    #[test]
    fn output_is_a_pure_function_of_durations() {
        let a = TelemetryAggregator::new();
        let b = TelemetryAggregator::new();
        for d in [5.0, 1.0, 3.0] {
            a.add_span("a1", &span("svc", 0, d, false));
        }
        for d in [3.0, 5.0, 1.0] {
            b.add_span("a1", &span("svc", 0, d, false));
        }
        assert_eq!(
            a.get_summaries()[0].p50_ms,
            b.get_summaries()[0].p50_ms
        );
    }

    #[test]
    fn buckets_split_on_minute_service_and_kind() {
        let agg = TelemetryAggregator::new();
        agg.add_span("a1", &span("checkout", 59, 1.0, false));
        agg.add_span("a1", &span("checkout", 60, 1.0, true));
        agg.add_span("a1", &span("billing", 60, 1.0, false));

        let summaries = agg.get_summaries();
        assert_eq!(summaries.len(), 3);
        let errored = summaries
            .iter()
            .find(|s| s.service == "checkout" && s.bucket_minute == 60)
            .unwrap();
        assert_eq!(errored.error_count, 1);
    }

    #[test]
    fn keeps_at_most_five_sample_trace_ids() {
        let agg = TelemetryAggregator::new();
        for i in 0..10 {
            agg.add_span("a1", &span("svc", 0, i as f64, false));
        }
        assert_eq!(
            agg.get_summaries()[0].sample_trace_ids.len(),
            MAX_SAMPLE_TRACE_IDS
        );
    }

    #[test]
    fn clear_resets_state() {
        let agg = TelemetryAggregator::new();
        agg.add_span("a1", &span("svc", 0, 1.0, false));
        agg.clear();
        assert!(agg.get_summaries().is_empty());
    }
}

use std::collections::HashMap;

use colony_core::{bucket_minute, MetricKind, SystemMetricRecord, SystemMetricSummary};

/// Roll host metric points up into one-minute buckets keyed by
/// `(bucket, agent, metric, attributes)`. Attributes are canonicalized via
/// their JSON encoding (object keys are ordered), so equal attribute sets
/// always share a key.
pub fn aggregate_system_metrics(
    agent_id: &str,
    records: &[SystemMetricRecord],
) -> Vec<SystemMetricSummary> {
    let mut by_key: HashMap<(i64, String, String), (MetricKind, Vec<f64>)> = HashMap::new();
    for record in records {
        let attributes_json =
            serde_json::to_string(&record.attributes).unwrap_or_else(|_| "{}".into());
        let entry = by_key
            .entry((
                bucket_minute(record.timestamp),
                record.name.clone(),
                attributes_json,
            ))
            .or_insert_with(|| (record.kind, Vec::new()));
        entry.1.push(record.value);
    }

    let mut summaries: Vec<SystemMetricSummary> = by_key
        .into_iter()
        .map(|((bucket, name, attributes_json), (kind, mut values))| {
            values.sort_by(|a, b| a.partial_cmp(b).expect("metric values are finite"));
            let n = values.len();
            let min = values[0];
            let max = values[n - 1];
            let avg = values.iter().sum::<f64>() / n as f64;
            let delta = if kind.has_delta() { max - min } else { 0.0 };

            SystemMetricSummary {
                bucket_minute: bucket,
                agent_id: agent_id.into(),
                metric_name: name,
                attributes_json,
                kind,
                min,
                max,
                avg,
                p95: percentile_interpolated(&values, 0.95),
                delta,
                sample_count: n as u64,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        (a.bucket_minute, &a.metric_name, &a.attributes_json).cmp(&(
            b.bucket_minute,
            &b.metric_name,
            &b.attributes_json,
        ))
    });
    summaries
}

/// Linear interpolation on sorted values at rank `p * (n - 1)`.
fn percentile_interpolated(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let weight = rank - lo as f64;
    sorted[lo] * (1.0 - weight) + sorted[hi] * weight
}

#[cfg(test)]
mod test {
    use super::*;

    fn metric(ts: i64, name: &str, value: f64, kind: MetricKind) -> SystemMetricRecord {
        SystemMetricRecord {
            seq_id: 0,
            timestamp: ts,
            name: name.into(),
            value,
            unit: "1".into(),
            kind,
            attributes: serde_json::json!({"cpu": "0"}),
        }
    }

    #[test]
    fn computes_min_max_avg_and_interpolated_p95() {
        let records: Vec<_> = (1..=5)
            .map(|i| metric(10, "system.cpu.utilization", i as f64, MetricKind::Gauge))
            .collect();

        let summaries = aggregate_system_metrics("a1", &records);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.avg, 3.0);
        // rank = 0.95 * 4 = 3.8 -> 4 * 0.2 + 5 * 0.8
        assert!((s.p95 - 4.8).abs() < 1e-9);
        assert_eq!(s.delta, 0.0);
        assert_eq!(s.sample_count, 5);
    }

    #[test]
    fn delta_only_for_counter_and_delta_kinds() {
        let counter: Vec<_> = [100.0, 150.0, 130.0]
            .iter()
            .map(|v| metric(10, "network.bytes", *v, MetricKind::Counter))
            .collect();
        let summaries = aggregate_system_metrics("a1", &counter);
        assert_eq!(summaries[0].delta, 50.0);
    }

    #[test]
    fn single_sample_percentile_is_the_sample() {
        let records = vec![metric(10, "m", 7.0, MetricKind::Gauge)];
        let summaries = aggregate_system_metrics("a1", &records);
        assert_eq!(summaries[0].p95, 7.0);
    }

    #[test]
    fn attribute_sets_split_keys() {
        let mut a = metric(10, "m", 1.0, MetricKind::Gauge);
        a.attributes = serde_json::json!({"cpu": "0"});
        let mut b = metric(10, "m", 2.0, MetricKind::Gauge);
        b.attributes = serde_json::json!({"cpu": "1"});

        assert_eq!(aggregate_system_metrics("a1", &[a, b]).len(), 2);
    }
}

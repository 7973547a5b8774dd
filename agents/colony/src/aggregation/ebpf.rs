use std::collections::HashMap;

use colony_core::{
    BeylaGrpcMetric, BeylaGrpcSummary, BeylaHttpMetric, BeylaHttpSummary, BeylaSqlMetric,
    BeylaSqlSummary,
};

/// Merge source-bucketed HTTP rows by `(service, method, route, status)`:
/// histogram pairs are appended, request counts summed. Output order follows
/// the key so replays produce identical batches.
pub fn aggregate_http_metrics(records: &[BeylaHttpMetric]) -> Vec<BeylaHttpSummary> {
    let mut by_key: HashMap<(String, String, String, u16), BeylaHttpSummary> = HashMap::new();
    for record in records {
        let summary = by_key
            .entry((
                record.service.clone(),
                record.method.clone(),
                record.route.clone(),
                record.status_code,
            ))
            .or_insert_with(|| BeylaHttpSummary {
                service: record.service.clone(),
                method: record.method.clone(),
                route: record.route.clone(),
                status_code: record.status_code,
                ..Default::default()
            });
        summary.histogram.add(record.latency_bucket_ms, record.count);
        summary.request_count += record.count;
    }

    let mut summaries: Vec<_> = by_key.into_values().collect();
    summaries.sort_by(|a, b| {
        (&a.service, &a.method, &a.route, a.status_code).cmp(&(
            &b.service,
            &b.method,
            &b.route,
            b.status_code,
        ))
    });
    summaries
}

/// Merge gRPC rows by `(service, method, status)`.
pub fn aggregate_grpc_metrics(records: &[BeylaGrpcMetric]) -> Vec<BeylaGrpcSummary> {
    let mut by_key: HashMap<(String, String, i32), BeylaGrpcSummary> = HashMap::new();
    for record in records {
        let summary = by_key
            .entry((
                record.service.clone(),
                record.method.clone(),
                record.status_code,
            ))
            .or_insert_with(|| BeylaGrpcSummary {
                service: record.service.clone(),
                method: record.method.clone(),
                status_code: record.status_code,
                ..Default::default()
            });
        summary.histogram.add(record.latency_bucket_ms, record.count);
        summary.request_count += record.count;
    }

    let mut summaries: Vec<_> = by_key.into_values().collect();
    summaries.sort_by(|a, b| {
        (&a.service, &a.method, a.status_code).cmp(&(&b.service, &b.method, b.status_code))
    });
    summaries
}

/// Merge SQL rows by `(service, operation, table)`.
pub fn aggregate_sql_metrics(records: &[BeylaSqlMetric]) -> Vec<BeylaSqlSummary> {
    let mut by_key: HashMap<(String, String, String), BeylaSqlSummary> = HashMap::new();
    for record in records {
        let summary = by_key
            .entry((
                record.service.clone(),
                record.operation.clone(),
                record.table.clone(),
            ))
            .or_insert_with(|| BeylaSqlSummary {
                service: record.service.clone(),
                operation: record.operation.clone(),
                table: record.table.clone(),
                ..Default::default()
            });
        summary.histogram.add(record.latency_bucket_ms, record.count);
        summary.request_count += record.count;
    }

    let mut summaries: Vec<_> = by_key.into_values().collect();
    summaries.sort_by(|a, b| {
        (&a.service, &a.operation, &a.table).cmp(&(&b.service, &b.operation, &b.table))
    });
    summaries
}

#[cfg(test)]
mod test {
    use super::*;

    fn http(service: &str, route: &str, status: u16, bucket: f64, count: u64) -> BeylaHttpMetric {
        BeylaHttpMetric {
            seq_id: 0,
            last_seen: 0,
            service: service.into(),
            method: "GET".into(),
            route: route.into(),
            status_code: status,
            latency_bucket_ms: bucket,
            count,
        }
    }

    #[test]
    fn merges_histograms_per_key() {
        let records = vec![
            http("checkout", "/cart", 200, 10.0, 5),
            http("checkout", "/cart", 200, 10.0, 3),
            http("checkout", "/cart", 200, 100.0, 1),
            http("checkout", "/cart", 500, 10.0, 2),
        ];

        let summaries = aggregate_http_metrics(&records);
        assert_eq!(summaries.len(), 2);

        let ok = &summaries[0];
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.request_count, 9);
        assert_eq!(ok.histogram.buckets, vec![10.0, 100.0]);
        assert_eq!(ok.histogram.counts, vec![8, 1]);

        let errs = &summaries[1];
        assert_eq!(errs.status_code, 500);
        assert_eq!(errs.request_count, 2);
    }

    #[test]
    fn output_order_is_deterministic() {
        let records = vec![
            http("zeta", "/z", 200, 1.0, 1),
            http("alpha", "/a", 200, 1.0, 1),
        ];
        let summaries = aggregate_http_metrics(&records);
        assert_eq!(summaries[0].service, "alpha");
        assert_eq!(summaries[1].service, "zeta");
    }
}

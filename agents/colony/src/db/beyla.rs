use std::collections::HashMap;

use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert};
use tracing::{instrument, trace};

use colony_core::{
    BeylaGrpcSummary, BeylaHttpSummary, BeylaSqlSummary, LatencyHistogram, SpanKind, TraceSpan,
};

use crate::date_time;
use crate::db::entities::{
    beyla_grpc_summary, beyla_http_summary, beyla_sql_summary, trace_span,
};
use crate::db::ColonyDb;

fn encode_histogram(histogram: &LatencyHistogram) -> Result<(String, String)> {
    Ok((
        serde_json::to_string(&histogram.buckets)?,
        serde_json::to_string(&histogram.counts)?,
    ))
}

fn decode_histogram(buckets: &str, counts: &str) -> LatencyHistogram {
    LatencyHistogram {
        buckets: serde_json::from_str(buckets).unwrap_or_default(),
        counts: serde_json::from_str(counts).unwrap_or_default(),
    }
}

impl ColonyDb {
    /// Fold a batch of HTTP summaries into the store: histograms of
    /// existing `(service, method, route, status)` rows are appended to,
    /// never re-bucketed, then the whole batch lands in one bulk upsert.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_beyla_http_summaries(&self, summaries: &[BeylaHttpSummary]) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let mut existing: HashMap<(String, String, String, i32), beyla_http_summary::Model> =
            HashMap::new();
        for summary in summaries {
            let row = beyla_http_summary::Entity::find()
                .filter(beyla_http_summary::Column::Service.eq(&*summary.service))
                .filter(beyla_http_summary::Column::Method.eq(&*summary.method))
                .filter(beyla_http_summary::Column::Route.eq(&*summary.route))
                .filter(beyla_http_summary::Column::StatusCode.eq(summary.status_code as i32))
                .one(self.conn())
                .await?;
            if let Some(row) = row {
                existing.insert(
                    (
                        row.service.clone(),
                        row.method.clone(),
                        row.route.clone(),
                        row.status_code,
                    ),
                    row,
                );
            }
        }

        let models = summaries
            .iter()
            .map(|summary| {
                let key = (
                    summary.service.clone(),
                    summary.method.clone(),
                    summary.route.clone(),
                    summary.status_code as i32,
                );
                let mut histogram = existing
                    .get(&key)
                    .map(|row| decode_histogram(&row.buckets, &row.counts))
                    .unwrap_or_default();
                histogram.merge(&summary.histogram);
                let request_count = existing.get(&key).map(|row| row.request_count).unwrap_or(0)
                    + summary.request_count as i64;

                let (buckets, counts) = encode_histogram(&histogram)?;
                Ok(beyla_http_summary::ActiveModel {
                    id: NotSet,
                    service: Unchanged(summary.service.clone()),
                    method: Unchanged(summary.method.clone()),
                    route: Unchanged(summary.route.clone()),
                    status_code: Unchanged(summary.status_code as i32),
                    buckets: Set(buckets),
                    counts: Set(counts),
                    request_count: Set(request_count),
                    time_updated: Set(date_time::now()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!("writing beyla http summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    beyla_http_summary::Column::Service,
                    beyla_http_summary::Column::Method,
                    beyla_http_summary::Column::Route,
                    beyla_http_summary::Column::StatusCode,
                ])
                .update_columns([
                    beyla_http_summary::Column::Buckets,
                    beyla_http_summary::Column::Counts,
                    beyla_http_summary::Column::RequestCount,
                    beyla_http_summary::Column::TimeUpdated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Same shape as the HTTP path for `(service, method, status)`.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_beyla_grpc_summaries(&self, summaries: &[BeylaGrpcSummary]) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let mut models = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let row = beyla_grpc_summary::Entity::find()
                .filter(beyla_grpc_summary::Column::Service.eq(&*summary.service))
                .filter(beyla_grpc_summary::Column::Method.eq(&*summary.method))
                .filter(beyla_grpc_summary::Column::StatusCode.eq(summary.status_code))
                .one(self.conn())
                .await?;

            let mut histogram = row
                .as_ref()
                .map(|row| decode_histogram(&row.buckets, &row.counts))
                .unwrap_or_default();
            histogram.merge(&summary.histogram);
            let request_count =
                row.map(|row| row.request_count).unwrap_or(0) + summary.request_count as i64;

            let (buckets, counts) = encode_histogram(&histogram)?;
            models.push(beyla_grpc_summary::ActiveModel {
                id: NotSet,
                service: Unchanged(summary.service.clone()),
                method: Unchanged(summary.method.clone()),
                status_code: Unchanged(summary.status_code),
                buckets: Set(buckets),
                counts: Set(counts),
                request_count: Set(request_count),
                time_updated: Set(date_time::now()),
            });
        }

        trace!("writing beyla grpc summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    beyla_grpc_summary::Column::Service,
                    beyla_grpc_summary::Column::Method,
                    beyla_grpc_summary::Column::StatusCode,
                ])
                .update_columns([
                    beyla_grpc_summary::Column::Buckets,
                    beyla_grpc_summary::Column::Counts,
                    beyla_grpc_summary::Column::RequestCount,
                    beyla_grpc_summary::Column::TimeUpdated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Same shape as the HTTP path for `(service, operation, table)`.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_beyla_sql_summaries(&self, summaries: &[BeylaSqlSummary]) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let mut models = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let row = beyla_sql_summary::Entity::find()
                .filter(beyla_sql_summary::Column::Service.eq(&*summary.service))
                .filter(beyla_sql_summary::Column::Operation.eq(&*summary.operation))
                .filter(beyla_sql_summary::Column::TableName.eq(&*summary.table))
                .one(self.conn())
                .await?;

            let mut histogram = row
                .as_ref()
                .map(|row| decode_histogram(&row.buckets, &row.counts))
                .unwrap_or_default();
            histogram.merge(&summary.histogram);
            let request_count =
                row.map(|row| row.request_count).unwrap_or(0) + summary.request_count as i64;

            let (buckets, counts) = encode_histogram(&histogram)?;
            models.push(beyla_sql_summary::ActiveModel {
                id: NotSet,
                service: Unchanged(summary.service.clone()),
                operation: Unchanged(summary.operation.clone()),
                table_name: Unchanged(summary.table.clone()),
                buckets: Set(buckets),
                counts: Set(counts),
                request_count: Set(request_count),
                time_updated: Set(date_time::now()),
            });
        }

        trace!("writing beyla sql summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    beyla_sql_summary::Column::Service,
                    beyla_sql_summary::Column::Operation,
                    beyla_sql_summary::Column::TableName,
                ])
                .update_columns([
                    beyla_sql_summary::Column::Buckets,
                    beyla_sql_summary::Column::Counts,
                    beyla_sql_summary::Column::RequestCount,
                    beyla_sql_summary::Column::TimeUpdated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Store raw trace spans; replays overwrite the same `(trace, span)`
    /// identity.
    #[instrument(skip_all, fields(count = spans.len()))]
    pub async fn store_trace_spans(&self, agent_id: &str, spans: &[TraceSpan]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }

        let models = spans
            .iter()
            .map(|span| trace_span::ActiveModel {
                id: NotSet,
                agent_id: Set(agent_id.into()),
                trace_id: Unchanged(span.trace_id.clone()),
                span_id: Unchanged(span.span_id.clone()),
                parent_span_id: Set(span.parent_span_id.clone()),
                service: Set(span.service.clone()),
                name: Set(span.name.clone()),
                kind: Set(span.kind.as_str().into()),
                start_time_us: Set(span.start_time_us),
                duration_us: Set(span.duration_us as i64),
                status: Set(span.status),
                time_created: Set(date_time::now()),
            })
            .collect::<Vec<_>>();

        trace!("writing trace spans");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([trace_span::Column::TraceId, trace_span::Column::SpanId])
                    .update_columns([
                        trace_span::Column::DurationUs,
                        trace_span::Column::Status,
                        trace_span::Column::TimeCreated,
                    ])
                    .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Spans of one trace, in start-time order.
    #[instrument(skip(self))]
    pub async fn trace_spans_by_trace_id(&self, trace_id: &str) -> Result<Vec<TraceSpan>> {
        use sea_orm::QueryOrder;

        Ok(trace_span::Entity::find()
            .filter(trace_span::Column::TraceId.eq(trace_id))
            .order_by_asc(trace_span::Column::StartTimeUs)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|model| TraceSpan {
                seq_id: 0,
                trace_id: model.trace_id,
                span_id: model.span_id,
                parent_span_id: model.parent_span_id,
                service: model.service,
                name: model.name,
                kind: match model.kind.as_str() {
                    "server" => SpanKind::Server,
                    "client" => SpanKind::Client,
                    "producer" => SpanKind::Producer,
                    "consumer" => SpanKind::Consumer,
                    _ => SpanKind::Internal,
                },
                start_time_us: model.start_time_us,
                duration_us: model.duration_us as u64,
                status: model.status,
            })
            .collect())
    }

    /// HTTP summaries whose last update falls in `[start, end]` (unix
    /// seconds), optionally narrowed to one service.
    #[instrument(skip(self))]
    pub async fn beyla_http_summaries_in_range(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<BeylaHttpSummary>> {
        let mut query = beyla_http_summary::Entity::find()
            .filter(
                beyla_http_summary::Column::TimeUpdated
                    .gte(date_time::from_unix_timestamp_s(start)),
            )
            .filter(
                beyla_http_summary::Column::TimeUpdated.lte(date_time::from_unix_timestamp_s(end)),
            );
        if let Some(service) = service {
            query = query.filter(beyla_http_summary::Column::Service.eq(service));
        }

        Ok(query
            .all(self.conn())
            .await?
            .into_iter()
            .map(|model| BeylaHttpSummary {
                service: model.service,
                method: model.method,
                route: model.route,
                status_code: model.status_code as u16,
                histogram: decode_histogram(&model.buckets, &model.counts),
                request_count: model.request_count as u64,
            })
            .collect())
    }
}

use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert};
use tracing::{instrument, trace};

use colony_core::{SpanKind, TelemetrySummary};

use crate::date_time;
use crate::db::entities::telemetry_summary;
use crate::db::ColonyDb;

fn to_model(summary: &TelemetrySummary) -> Result<telemetry_summary::ActiveModel> {
    Ok(telemetry_summary::ActiveModel {
        id: NotSet,
        agent_id: Unchanged(summary.agent_id.clone()),
        bucket_minute: Unchanged(summary.bucket_minute),
        service: Unchanged(summary.service.clone()),
        kind: Unchanged(summary.kind.as_str().into()),
        p50_ms: Set(summary.p50_ms),
        p95_ms: Set(summary.p95_ms),
        p99_ms: Set(summary.p99_ms),
        total_spans: Set(summary.total_spans as i64),
        error_count: Set(summary.error_count as i64),
        sample_trace_ids: Set(serde_json::to_string(&summary.sample_trace_ids)?),
        time_created: Set(date_time::now()),
    })
}

fn from_model(model: telemetry_summary::Model) -> TelemetrySummary {
    TelemetrySummary {
        agent_id: model.agent_id,
        bucket_minute: model.bucket_minute,
        service: model.service,
        kind: span_kind_from_str(&model.kind),
        p50_ms: model.p50_ms,
        p95_ms: model.p95_ms,
        p99_ms: model.p99_ms,
        total_spans: model.total_spans as u64,
        error_count: model.error_count as u64,
        sample_trace_ids: serde_json::from_str(&model.sample_trace_ids).unwrap_or_default(),
    }
}

fn span_kind_from_str(raw: &str) -> SpanKind {
    match raw {
        "server" => SpanKind::Server,
        "client" => SpanKind::Client,
        "producer" => SpanKind::Producer,
        "consumer" => SpanKind::Consumer,
        _ => SpanKind::Internal,
    }
}

impl ColonyDb {
    /// Store one batch of telemetry summaries. A re-aggregated batch after a
    /// failed cycle overwrites the same composite-key rows, so the write is
    /// retry-idempotent together with commit-then-advance.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_telemetry_summaries(&self, summaries: &[TelemetrySummary]) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let models = summaries
            .iter()
            .map(to_model)
            .collect::<Result<Vec<_>>>()?;

        trace!("writing telemetry summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    telemetry_summary::Column::AgentId,
                    telemetry_summary::Column::BucketMinute,
                    telemetry_summary::Column::Service,
                    telemetry_summary::Column::Kind,
                ])
                .update_columns([
                    telemetry_summary::Column::P50Ms,
                    telemetry_summary::Column::P95Ms,
                    telemetry_summary::Column::P99Ms,
                    telemetry_summary::Column::TotalSpans,
                    telemetry_summary::Column::ErrorCount,
                    telemetry_summary::Column::SampleTraceIds,
                    telemetry_summary::Column::TimeCreated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Telemetry summaries with `bucket_minute` in `[start, end]`.
    #[instrument(skip(self))]
    pub async fn telemetry_summaries_in_range(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<TelemetrySummary>> {
        let mut query = telemetry_summary::Entity::find()
            .filter(telemetry_summary::Column::BucketMinute.gte(start))
            .filter(telemetry_summary::Column::BucketMinute.lte(end));
        if let Some(service) = service {
            query = query.filter(telemetry_summary::Column::Service.eq(service));
        }

        Ok(query
            .all(self.conn())
            .await?
            .into_iter()
            .map(from_model)
            .collect())
    }
}

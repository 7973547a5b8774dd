use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert};
use tracing::{instrument, trace};

use colony_core::{MetricKind, SystemMetricSummary};

use crate::db::entities::system_metric_summary;
use crate::db::ColonyDb;

fn metric_kind_from_str(raw: &str) -> MetricKind {
    match raw {
        "counter" => MetricKind::Counter,
        "delta" => MetricKind::Delta,
        _ => MetricKind::Gauge,
    }
}

impl ColonyDb {
    /// Store one batch of system metric summaries; replays overwrite the
    /// same composite-key rows.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_system_metric_summaries(
        &self,
        summaries: &[SystemMetricSummary],
    ) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let models = summaries
            .iter()
            .map(|summary| system_metric_summary::ActiveModel {
                id: NotSet,
                agent_id: Unchanged(summary.agent_id.clone()),
                bucket_minute: Unchanged(summary.bucket_minute),
                metric_name: Unchanged(summary.metric_name.clone()),
                attributes: Unchanged(summary.attributes_json.clone()),
                kind: Set(summary.kind.as_str().into()),
                min: Set(summary.min),
                max: Set(summary.max),
                avg: Set(summary.avg),
                p95: Set(summary.p95),
                delta: Set(summary.delta),
                sample_count: Set(summary.sample_count as i64),
            })
            .collect::<Vec<_>>();

        trace!("writing system metric summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    system_metric_summary::Column::AgentId,
                    system_metric_summary::Column::BucketMinute,
                    system_metric_summary::Column::MetricName,
                    system_metric_summary::Column::Attributes,
                ])
                .update_columns([
                    system_metric_summary::Column::Kind,
                    system_metric_summary::Column::Min,
                    system_metric_summary::Column::Max,
                    system_metric_summary::Column::Avg,
                    system_metric_summary::Column::P95,
                    system_metric_summary::Column::Delta,
                    system_metric_summary::Column::SampleCount,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// System metric summaries with `bucket_minute` in `[start, end]`.
    #[instrument(skip(self))]
    pub async fn system_metric_summaries_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<SystemMetricSummary>> {
        Ok(system_metric_summary::Entity::find()
            .filter(system_metric_summary::Column::BucketMinute.gte(start))
            .filter(system_metric_summary::Column::BucketMinute.lte(end))
            .all(self.conn())
            .await?
            .into_iter()
            .map(|model| SystemMetricSummary {
                bucket_minute: model.bucket_minute,
                agent_id: model.agent_id,
                metric_name: model.metric_name,
                attributes_json: model.attributes,
                kind: metric_kind_from_str(&model.kind),
                min: model.min,
                max: model.max,
                avg: model.avg,
                p95: model.p95,
                delta: model.delta,
                sample_count: model.sample_count as u64,
            })
            .collect())
    }
}

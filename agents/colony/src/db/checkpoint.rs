use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert, QueryOrder};
use tracing::{instrument, trace, warn};

use colony_core::{DataType, GapStatus, PollingCheckpoint, SequenceGap};

use crate::date_time;
use crate::db::entities::{polling_checkpoint, sequence_gap};
use crate::db::ColonyDb;

impl ColonyDb {
    /// Load the checkpoint for `(agent, data_type)`, if one was ever
    /// committed. Read-your-writes.
    #[instrument(skip(self))]
    pub async fn checkpoint(
        &self,
        agent_id: &str,
        data_type: DataType,
    ) -> Result<Option<PollingCheckpoint>> {
        Ok(polling_checkpoint::Entity::find()
            .filter(polling_checkpoint::Column::AgentId.eq(agent_id))
            .filter(polling_checkpoint::Column::DataType.eq(data_type.as_str()))
            .one(self.conn())
            .await?
            .map(|model| PollingCheckpoint {
                agent_id: model.agent_id,
                data_type,
                session_id: model.session_id,
                last_seq_id: model.last_seq_id as u64,
                updated_at: model.time_updated.assume_utc(),
            }))
    }

    /// Overwrite the checkpoint for `(agent, data_type)`.
    ///
    /// Must be called only after the aggregates derived from records up to
    /// `last_seq_id` are committed; monotonicity is the caller's discipline,
    /// not enforced here.
    #[instrument(skip(self))]
    pub async fn update_checkpoint(
        &self,
        agent_id: &str,
        data_type: DataType,
        session_id: &str,
        last_seq_id: u64,
    ) -> Result<()> {
        let model = polling_checkpoint::ActiveModel {
            id: NotSet,
            agent_id: Set(agent_id.into()),
            data_type: Set(data_type.as_str().into()),
            session_id: Set(session_id.into()),
            last_seq_id: Set(last_seq_id as i64),
            time_updated: Set(date_time::now()),
        };

        Insert::one(model)
            .on_conflict(
                OnConflict::columns([
                    polling_checkpoint::Column::AgentId,
                    polling_checkpoint::Column::DataType,
                ])
                .update_columns([
                    polling_checkpoint::Column::SessionId,
                    polling_checkpoint::Column::LastSeqId,
                    polling_checkpoint::Column::TimeUpdated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Drop the checkpoint for `(agent, data_type)`; the next read returns
    /// none. Used when the agent's session changed and seq-ids restarted.
    #[instrument(skip(self))]
    pub async fn reset_checkpoint(&self, agent_id: &str, data_type: DataType) -> Result<()> {
        let res = polling_checkpoint::Entity::delete_many()
            .filter(polling_checkpoint::Column::AgentId.eq(agent_id))
            .filter(polling_checkpoint::Column::DataType.eq(data_type.as_str()))
            .exec(self.conn())
            .await?;
        warn!(
            agent_id,
            data_type = %data_type,
            rows = res.rows_affected,
            "checkpoint reset"
        );
        Ok(())
    }

    /// Record an observed hole in the seq-id stream.
    #[instrument(skip(self))]
    pub async fn record_gap(
        &self,
        agent_id: &str,
        data_type: DataType,
        start_seq_id: u64,
        end_seq_id: u64,
    ) -> Result<()> {
        let model = sequence_gap::ActiveModel {
            id: NotSet,
            agent_id: Set(agent_id.into()),
            data_type: Set(data_type.as_str().into()),
            start_seq_id: Set(start_seq_id as i64),
            end_seq_id: Set(end_seq_id as i64),
            status: Set(GapStatus::Detected.as_str().into()),
            time_created: Set(date_time::now()),
        };
        model.insert(self.conn()).await?;
        Ok(())
    }

    /// Open gaps for one stream, oldest first. `agent_id` narrows to one
    /// agent when given.
    #[instrument(skip(self))]
    pub async fn pending_gaps(
        &self,
        agent_id: Option<&str>,
        data_type: DataType,
    ) -> Result<Vec<SequenceGap>> {
        let mut query = sequence_gap::Entity::find()
            .filter(sequence_gap::Column::DataType.eq(data_type.as_str()))
            .filter(sequence_gap::Column::Status.eq(GapStatus::Detected.as_str()));
        if let Some(agent_id) = agent_id {
            query = query.filter(sequence_gap::Column::AgentId.eq(agent_id));
        }
        let rows = query
            .order_by_asc(sequence_gap::Column::TimeCreated)
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|model| SequenceGap {
                id: model.id,
                agent_id: model.agent_id,
                data_type,
                start_seq_id: model.start_seq_id as u64,
                end_seq_id: model.end_seq_id as u64,
                status: GapStatus::Detected,
                created_at: model.time_created.assume_utc(),
            })
            .collect())
    }

    /// Transition one gap to recovered.
    #[instrument(skip(self))]
    pub async fn mark_gap_recovered(&self, gap_id: i64) -> Result<()> {
        let model = sequence_gap::ActiveModel {
            id: Unchanged(gap_id),
            status: Set(GapStatus::Recovered.as_str().into()),
            ..Default::default()
        };
        model.update(self.conn()).await?;
        trace!(gap_id, "gap recovered");
        Ok(())
    }
}

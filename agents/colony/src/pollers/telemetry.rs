use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use tracing::{debug, instrument};

use colony_base::{for_each_healthy_agent, AgentRegistry, CycleSummary, Poller, PollerSyncMetrics};
use colony_core::{AgentConnector, AgentEntry, DataType, QueryTelemetryRequest};

use crate::aggregation::TelemetryAggregator;
use crate::db::ColonyDb;

use super::{checkpoint_state, expire_stale_gaps, record_gaps, session_mismatch, CycleState};

const MAX_RECORDS: u32 = 10_000;

/// Pulls OTLP spans from every pollable agent and commits one-minute
/// telemetry summaries.
#[derive(Debug)]
pub struct TelemetryPoller {
    db: ColonyDb,
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn AgentConnector>,
    metrics: PollerSyncMetrics,
}

impl TelemetryPoller {
    /// Constructor.
    pub fn new(
        db: ColonyDb,
        registry: Arc<AgentRegistry>,
        connector: Arc<dyn AgentConnector>,
        metrics: PollerSyncMetrics,
    ) -> Self {
        Self {
            db,
            registry,
            connector,
            metrics,
        }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.agent_id))]
    async fn poll_agent(&self, agent: &AgentEntry) -> Result<u64> {
        let data_type = DataType::Telemetry;
        let channel = self.connector.connect(agent);

        let (mut start_seq, stored_session) =
            checkpoint_state(&self.db, &agent.agent_id, data_type).await?;

        let mut resp = channel
            .query_telemetry(QueryTelemetryRequest {
                start_seq_id: start_seq,
                max_records: MAX_RECORDS,
                ..Default::default()
            })
            .await?;

        if session_mismatch(&stored_session, &resp.session_id) {
            debug!(
                stored = %stored_session,
                received = %resp.session_id,
                "telemetry session changed, resetting checkpoint"
            );
            self.db.reset_checkpoint(&agent.agent_id, data_type).await?;
            start_seq = 0;
            resp = channel
                .query_telemetry(QueryTelemetryRequest {
                    start_seq_id: 0,
                    max_records: MAX_RECORDS,
                    ..Default::default()
                })
                .await?;
        }

        if resp.spans.is_empty() {
            return Ok(0);
        }

        let seq_and_ts: Vec<(u64, i64)> =
            resp.spans.iter().map(|s| (s.seq_id, s.timestamp)).collect();
        record_gaps(
            &self.db,
            &self.metrics,
            &agent.agent_id,
            data_type,
            start_seq,
            &seq_and_ts,
        )
        .await?;

        let aggregator = TelemetryAggregator::new();
        for span in &resp.spans {
            aggregator.add_span(&agent.agent_id, span);
        }
        let summaries = aggregator.get_summaries();

        // Aggregates land before the checkpoint moves; a failure here leaves
        // the checkpoint untouched and the batch is re-fetched next cycle.
        self.db
            .store_telemetry_summaries(&summaries)
            .await
            .context("storing telemetry summaries")?;
        self.db
            .update_checkpoint(
                &agent.agent_id,
                data_type,
                &resp.session_id,
                resp.max_seq_id,
            )
            .await
            .context("advancing telemetry checkpoint")?;

        let stored = resp.spans.len() as u64;
        self.metrics
            .stored_records
            .with_label_values(&[data_type.as_str(), &agent.agent_id])
            .inc_by(stored);
        self.metrics
            .committed_seq_id
            .with_label_values(&[data_type.as_str(), &agent.agent_id])
            .set(resp.max_seq_id as i64);
        Ok(stored)
    }
}

#[async_trait]
impl Poller for TelemetryPoller {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    async fn poll_once(&self) -> Result<CycleSummary> {
        let state = CycleState::shared();
        let state_ref = &state;
        let (agents_queried, agents_failed) =
            for_each_healthy_agent(&self.registry, |agent| async move {
                match self.poll_agent(&agent).await {
                    Ok(records) => {
                        CycleState::add_records(state_ref, records);
                        Ok(())
                    }
                    Err(report) => {
                        self.metrics
                            .agent_errors
                            .with_label_values(&[DataType::Telemetry.as_str()])
                            .inc();
                        CycleState::note_failure(state_ref, &report);
                        Err(report)
                    }
                }
            })
            .await;

        let (records, first_storage_error) = CycleState::into_parts(state);
        match first_storage_error {
            Some(report) => Err(report),
            None => Ok(CycleSummary {
                agents_queried,
                agents_failed,
                records,
            }),
        }
    }

    async fn run_cleanup(&self) -> Result<()> {
        let expired = expire_stale_gaps(&self.db, DataType::Telemetry).await?;
        if expired > 0 {
            debug!(expired, "expired stale telemetry gaps");
        }
        Ok(())
    }
}

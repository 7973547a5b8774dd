use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use prometheus::IntGaugeVec;
use time::OffsetDateTime;
use tracing::instrument;

use colony_base::{for_each_healthy_agent, AgentRegistry, CycleSummary, Poller, PollerSyncMetrics};
use colony_core::AgentEntry;

use crate::db::ColonyDb;

use super::CycleState;

/// Reconciles the agent-reported service catalogue into the services table.
/// Pure reconciliation: no checkpoint, no gap ledger.
#[derive(Debug)]
pub struct ServicePoller {
    db: ColonyDb,
    registry: Arc<AgentRegistry>,
    metrics: PollerSyncMetrics,
    registered_agents: IntGaugeVec,
}

impl ServicePoller {
    /// Constructor.
    pub fn new(
        db: ColonyDb,
        registry: Arc<AgentRegistry>,
        metrics: PollerSyncMetrics,
        registered_agents: IntGaugeVec,
    ) -> Self {
        Self {
            db,
            registry,
            metrics,
            registered_agents,
        }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.agent_id))]
    async fn poll_agent(&self, agent: &AgentEntry) -> Result<u64> {
        self.db
            .upsert_services(&agent.agent_id, &agent.services)
            .await
            .context("reconciling service catalogue")?;
        Ok(agent.services.len() as u64)
    }
}

#[async_trait]
impl Poller for ServicePoller {
    fn name(&self) -> &'static str {
        "services"
    }

    async fn poll_once(&self) -> Result<CycleSummary> {
        let (healthy, degraded, unhealthy) = self.registry.census(OffsetDateTime::now_utc());
        self.registered_agents
            .with_label_values(&["healthy"])
            .set(healthy as i64);
        self.registered_agents
            .with_label_values(&["degraded"])
            .set(degraded as i64);
        self.registered_agents
            .with_label_values(&["unhealthy"])
            .set(unhealthy as i64);

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
                            .with_label_values(&["services"])
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
}

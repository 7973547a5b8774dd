use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use eyre::{Context, Result};
use tracing::{debug, instrument, trace};

use colony_base::{for_each_healthy_agent, AgentRegistry, CycleSummary, Poller, PollerSyncMetrics};
use colony_core::{functions_content_hash, AgentConnector, AgentEntry, ServiceInfo};

use crate::db::ColonyDb;

use super::CycleState;

/// Pulls per-service function metadata with content-addressed change
/// detection: the upsert is skipped when the SHA-256 over the function list
/// matches the last one seen for `(agent, service)`.
///
/// No seq-ids are involved; the hash map is process-scoped and rebuilt from
/// scratch on restart, which only costs one redundant upsert per service.
pub struct FunctionPoller {
    db: ColonyDb,
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn AgentConnector>,
    metrics: PollerSyncMetrics,
    service_hashes: RwLock<HashMap<(String, String), String>>,
}

impl std::fmt::Debug for FunctionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FunctionPoller")
    }
}

impl FunctionPoller {
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
            service_hashes: RwLock::new(HashMap::new()),
        }
    }

    fn last_hash(&self, agent_id: &str, service: &str) -> Option<String> {
        self.service_hashes
            .read()
            .expect("service hash lock poisoned")
            .get(&(agent_id.to_owned(), service.to_owned()))
            .cloned()
    }

    fn remember_hash(&self, agent_id: &str, service: &str, hash: String) {
        self.service_hashes
            .write()
            .expect("service hash lock poisoned")
            .insert((agent_id.to_owned(), service.to_owned()), hash);
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.agent_id))]
    async fn poll_agent(&self, agent: &AgentEntry) -> Result<u64> {
        let channel = self.connector.connect(agent);

        // Stale registry entries carry no service list; refresh it with the
        // real-time listing instead of skipping the agent.
        let services: Vec<ServiceInfo> = if agent.services.is_empty() {
            channel.list_services().await?.services
        } else {
            agent.services.clone()
        };

        let mut upserted = 0u64;
        for service in &services {
            let resp = channel.get_functions(&service.name).await?;
            if resp.functions.is_empty() {
                continue;
            }

            let content_hash = functions_content_hash(&resp.functions);
            if self.last_hash(&agent.agent_id, &service.name).as_deref()
                == Some(content_hash.as_str())
            {
                trace!(service = %service.name, "function list unchanged, skipping upsert");
                continue;
            }

            // The binary hash reported by the agent is the write key; fall
            // back to the content hash when symbolization found none.
            let binary_hash = resp
                .binary_hash
                .clone()
                .or_else(|| service.binary_hash.clone())
                .unwrap_or_else(|| content_hash.clone());

            self.db
                .upsert_functions(&service.name, &binary_hash, &resp.functions)
                .await
                .context("upserting function metadata")?;
            self.db
                .record_binary_version(&service.name, &binary_hash)
                .await
                .context("recording binary version")?;

            self.remember_hash(&agent.agent_id, &service.name, content_hash);
            upserted += resp.functions.len() as u64;
            debug!(
                service = %service.name,
                binary_hash = %binary_hash,
                functions = resp.functions.len(),
                "function metadata updated"
            );
        }

        self.metrics
            .stored_records
            .with_label_values(&["functions", &agent.agent_id])
            .inc_by(upserted);
        Ok(upserted)
    }
}

#[async_trait]
impl Poller for FunctionPoller {
    fn name(&self) -> &'static str {
        "functions"
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
                            .with_label_values(&["functions"])
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

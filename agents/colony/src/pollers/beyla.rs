use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use tracing::{debug, instrument, warn};

use colony_base::{for_each_healthy_agent, AgentRegistry, CycleSummary, Poller, PollerSyncMetrics};
use colony_core::{
    AgentConnector, AgentEntry, DataType, QueryEbpfMetricsRequest, QueryEbpfMetricsResponse,
};

use crate::aggregation::{aggregate_grpc_metrics, aggregate_http_metrics, aggregate_sql_metrics};
use crate::db::ColonyDb;

use super::{checkpoint_state, expire_stale_gaps, record_gaps, session_mismatch, CycleState};

const MAX_RECORDS: u32 = 5_000;

/// Start positions of the four sub-streams served by the shared Beyla RPC.
#[derive(Clone, Copy, Debug, Default)]
struct StartSeqs {
    http: u64,
    grpc: u64,
    sql: u64,
    traces: u64,
}

/// Pulls the four eBPF sub-streams (HTTP, gRPC, SQL, trace spans) in one
/// RPC per agent. Each sub-stream keeps its own seq-id space and
/// checkpoint; the session is common, so a session change resets all four.
#[derive(Debug)]
pub struct BeylaPoller {
    db: ColonyDb,
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn AgentConnector>,
    metrics: PollerSyncMetrics,
}

impl BeylaPoller {
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

    async fn load_starts(&self, agent_id: &str) -> Result<(StartSeqs, String)> {
        let (http, http_session) = checkpoint_state(&self.db, agent_id, DataType::BeylaHttp).await?;
        let (grpc, grpc_session) = checkpoint_state(&self.db, agent_id, DataType::BeylaGrpc).await?;
        let (sql, sql_session) = checkpoint_state(&self.db, agent_id, DataType::BeylaSql).await?;
        let (traces, traces_session) =
            checkpoint_state(&self.db, agent_id, DataType::BeylaTraces).await?;

        // The four rows share one session; any non-empty stored value works
        // for the mismatch test.
        let stored_session = [http_session, grpc_session, sql_session, traces_session]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default();

        Ok((
            StartSeqs {
                http,
                grpc,
                sql,
                traces,
            },
            stored_session,
        ))
    }

    fn request(starts: StartSeqs) -> QueryEbpfMetricsRequest {
        QueryEbpfMetricsRequest {
            http_start_seq: starts.http,
            grpc_start_seq: starts.grpc,
            sql_start_seq: starts.sql,
            traces_start_seq: starts.traces,
            max_records: MAX_RECORDS,
            include_traces: true,
            max_traces: MAX_RECORDS,
            ..Default::default()
        }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.agent_id))]
    async fn poll_agent(&self, agent: &AgentEntry) -> Result<u64> {
        let channel = self.connector.connect(agent);

        let (mut starts, stored_session) = self.load_starts(&agent.agent_id).await?;
        let mut resp = channel.query_ebpf_metrics(Self::request(starts)).await?;

        if session_mismatch(&stored_session, &resp.session_id) {
            debug!(
                stored = %stored_session,
                received = %resp.session_id,
                "beyla session changed, resetting all four sub-type checkpoints"
            );
            for data_type in DataType::BEYLA {
                self.db.reset_checkpoint(&agent.agent_id, data_type).await?;
            }
            starts = StartSeqs::default();
            resp = channel.query_ebpf_metrics(Self::request(starts)).await?;
        }

        // Sub-streams commit independently: one failing store leaves only
        // its own checkpoint behind, the other three advance.
        let mut stored = 0u64;
        let mut first_error: Option<eyre::Report> = None;
        for result in [
            self.commit_http(&agent.agent_id, starts.http, &resp).await,
            self.commit_grpc(&agent.agent_id, starts.grpc, &resp).await,
            self.commit_sql(&agent.agent_id, starts.sql, &resp).await,
            self.commit_traces(&agent.agent_id, starts.traces, &resp)
                .await,
        ] {
            match result {
                Ok(records) => stored += records,
                Err(report) => {
                    warn!(agent_id = %agent.agent_id, error = ?report, "beyla sub-stream commit failed");
                    if first_error.is_none() {
                        first_error = Some(report);
                    }
                }
            }
        }

        match first_error {
            Some(report) => Err(report),
            None => Ok(stored),
        }
    }

    async fn commit_http(
        &self,
        agent_id: &str,
        start_seq: u64,
        resp: &QueryEbpfMetricsResponse,
    ) -> Result<u64> {
        if resp.http_metrics.is_empty() {
            return Ok(0);
        }
        let data_type = DataType::BeylaHttp;

        let seq_and_ts: Vec<(u64, i64)> = resp
            .http_metrics
            .iter()
            .map(|m| (m.seq_id, m.last_seen))
            .collect();
        record_gaps(&self.db, &self.metrics, agent_id, data_type, start_seq, &seq_and_ts).await?;

        let summaries = aggregate_http_metrics(&resp.http_metrics);
        self.db
            .store_beyla_http_summaries(&summaries)
            .await
            .context("storing beyla http summaries")?;
        self.db
            .update_checkpoint(agent_id, data_type, &resp.session_id, resp.http_max_seq_id)
            .await
            .context("advancing beyla http checkpoint")?;

        self.note_committed(data_type, agent_id, resp.http_metrics.len(), resp.http_max_seq_id);
        Ok(resp.http_metrics.len() as u64)
    }

    async fn commit_grpc(
        &self,
        agent_id: &str,
        start_seq: u64,
        resp: &QueryEbpfMetricsResponse,
    ) -> Result<u64> {
        if resp.grpc_metrics.is_empty() {
            return Ok(0);
        }
        let data_type = DataType::BeylaGrpc;

        let seq_and_ts: Vec<(u64, i64)> = resp
            .grpc_metrics
            .iter()
            .map(|m| (m.seq_id, m.last_seen))
            .collect();
        record_gaps(&self.db, &self.metrics, agent_id, data_type, start_seq, &seq_and_ts).await?;

        let summaries = aggregate_grpc_metrics(&resp.grpc_metrics);
        self.db
            .store_beyla_grpc_summaries(&summaries)
            .await
            .context("storing beyla grpc summaries")?;
        self.db
            .update_checkpoint(agent_id, data_type, &resp.session_id, resp.grpc_max_seq_id)
            .await
            .context("advancing beyla grpc checkpoint")?;

        self.note_committed(data_type, agent_id, resp.grpc_metrics.len(), resp.grpc_max_seq_id);
        Ok(resp.grpc_metrics.len() as u64)
    }

    async fn commit_sql(
        &self,
        agent_id: &str,
        start_seq: u64,
        resp: &QueryEbpfMetricsResponse,
    ) -> Result<u64> {
        if resp.sql_metrics.is_empty() {
            return Ok(0);
        }
        let data_type = DataType::BeylaSql;

        let seq_and_ts: Vec<(u64, i64)> = resp
            .sql_metrics
            .iter()
            .map(|m| (m.seq_id, m.last_seen))
            .collect();
        record_gaps(&self.db, &self.metrics, agent_id, data_type, start_seq, &seq_and_ts).await?;

        let summaries = aggregate_sql_metrics(&resp.sql_metrics);
        self.db
            .store_beyla_sql_summaries(&summaries)
            .await
            .context("storing beyla sql summaries")?;
        self.db
            .update_checkpoint(agent_id, data_type, &resp.session_id, resp.sql_max_seq_id)
            .await
            .context("advancing beyla sql checkpoint")?;

        self.note_committed(data_type, agent_id, resp.sql_metrics.len(), resp.sql_max_seq_id);
        Ok(resp.sql_metrics.len() as u64)
    }

    async fn commit_traces(
        &self,
        agent_id: &str,
        start_seq: u64,
        resp: &QueryEbpfMetricsResponse,
    ) -> Result<u64> {
        if resp.trace_spans.is_empty() {
            return Ok(0);
        }
        let data_type = DataType::BeylaTraces;

        let seq_and_ts: Vec<(u64, i64)> = resp
            .trace_spans
            .iter()
            .map(|s| (s.seq_id, s.start_time_us / 1_000_000))
            .collect();
        record_gaps(&self.db, &self.metrics, agent_id, data_type, start_seq, &seq_and_ts).await?;

        self.db
            .store_trace_spans(agent_id, &resp.trace_spans)
            .await
            .context("storing beyla trace spans")?;
        self.db
            .update_checkpoint(agent_id, data_type, &resp.session_id, resp.traces_max_seq_id)
            .await
            .context("advancing beyla traces checkpoint")?;

        self.note_committed(data_type, agent_id, resp.trace_spans.len(), resp.traces_max_seq_id);
        Ok(resp.trace_spans.len() as u64)
    }

    fn note_committed(&self, data_type: DataType, agent_id: &str, records: usize, max_seq: u64) {
        self.metrics
            .stored_records
            .with_label_values(&[data_type.as_str(), agent_id])
            .inc_by(records as u64);
        self.metrics
            .committed_seq_id
            .with_label_values(&[data_type.as_str(), agent_id])
            .set(max_seq as i64);
    }
}

#[async_trait]
impl Poller for BeylaPoller {
    fn name(&self) -> &'static str {
        "beyla"
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
                            .with_label_values(&["beyla"])
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
        let mut expired = 0;
        for data_type in DataType::BEYLA {
            expired += expire_stale_gaps(&self.db, data_type).await?;
        }
        if expired > 0 {
            debug!(expired, "expired stale beyla gaps");
        }
        Ok(())
    }
}

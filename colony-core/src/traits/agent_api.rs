use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    AgentApiError, AgentEntry, BeylaGrpcMetric, BeylaHttpMetric, BeylaSqlMetric, FunctionInfo,
    MemorySample, ServiceInfo, SpanRecord, SystemMetricRecord, TraceSpan,
};

/// Budget for cheap liveness-style calls (service listing).
pub const REALTIME_RPC_TIMEOUT: Duration = Duration::from_millis(500);

/// Budget for the standard data-pull calls.
pub const STANDARD_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for heavyweight calls (function metadata).
pub const LONG_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Checkpointed telemetry pull. The time-range fields are the legacy
/// surface and are only honored when the seq window is unset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryTelemetryRequest {
    /// Pull records with `seq_id > start_seq_id`.
    pub start_seq_id: u64,
    /// Cap on records returned.
    pub max_records: u32,
    /// Legacy: window start, unix seconds.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Legacy: window end, unix seconds.
    #[serde(default)]
    pub end_time: Option<i64>,
    /// Restrict to these services; empty means all.
    #[serde(default)]
    pub service_names: Vec<String>,
}

/// Telemetry pull response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryTelemetryResponse {
    /// Spans, ascending by seq-id.
    pub spans: Vec<SpanRecord>,
    /// Highest seq-id in the agent's store for this stream.
    pub max_seq_id: u64,
    /// Session the seq-ids are ordered within.
    pub session_id: String,
}

/// Checkpointed pull over the four Beyla sub-streams, one RPC.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryEbpfMetricsRequest {
    /// Pull HTTP metrics with `seq_id > http_start_seq`.
    pub http_start_seq: u64,
    /// Pull gRPC metrics with `seq_id > grpc_start_seq`.
    pub grpc_start_seq: u64,
    /// Pull SQL metrics with `seq_id > sql_start_seq`.
    pub sql_start_seq: u64,
    /// Pull trace spans with `seq_id > traces_start_seq`.
    pub traces_start_seq: u64,
    /// Cap on records returned per sub-stream.
    pub max_records: u32,
    /// Restrict to these services; empty means all.
    #[serde(default)]
    pub service_names: Vec<String>,
    /// Restrict to these metric types; empty means all.
    #[serde(default)]
    pub metric_types: Vec<String>,
    /// Whether trace spans should be included.
    #[serde(default)]
    pub include_traces: bool,
    /// Cap on trace spans returned.
    #[serde(default)]
    pub max_traces: u32,
    /// Restrict trace spans to one trace.
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Beyla pull response. Each sub-stream carries its own seq-id space; the
/// session is shared.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryEbpfMetricsResponse {
    /// HTTP metric rows, ascending by seq-id.
    pub http_metrics: Vec<BeylaHttpMetric>,
    /// gRPC metric rows.
    pub grpc_metrics: Vec<BeylaGrpcMetric>,
    /// SQL metric rows.
    pub sql_metrics: Vec<BeylaSqlMetric>,
    /// Trace spans, when requested.
    pub trace_spans: Vec<TraceSpan>,
    /// Highest HTTP seq-id in the agent's store.
    pub http_max_seq_id: u64,
    /// Highest gRPC seq-id.
    pub grpc_max_seq_id: u64,
    /// Highest SQL seq-id.
    pub sql_max_seq_id: u64,
    /// Highest trace-span seq-id.
    pub traces_max_seq_id: u64,
    /// Session shared by the four sub-streams.
    pub session_id: String,
}

/// Checkpointed host-metrics pull.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuerySystemMetricsRequest {
    /// Pull metrics with `seq_id > start_seq_id`.
    pub start_seq_id: u64,
    /// Cap on records returned.
    pub max_records: u32,
    /// Restrict to these metric names; empty means all.
    #[serde(default)]
    pub metric_names: Vec<String>,
}

/// Host-metrics pull response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuerySystemMetricsResponse {
    /// Metric points, ascending by seq-id.
    pub metrics: Vec<SystemMetricRecord>,
    /// Highest seq-id in the agent's store.
    pub max_seq_id: u64,
    /// Session the seq-ids are ordered within.
    pub session_id: String,
}

/// Checkpointed memory-profile pull.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryMemoryProfileSamplesRequest {
    /// Pull samples with `seq_id > start_seq_id`.
    pub start_seq_id: u64,
    /// Cap on samples returned.
    pub max_records: u32,
}

/// Memory-profile pull response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryMemoryProfileSamplesResponse {
    /// Samples, ascending by seq-id.
    pub samples: Vec<MemorySample>,
    /// Highest seq-id in the agent's store.
    pub max_seq_id: u64,
    /// Session the seq-ids are ordered within.
    pub session_id: String,
    /// Error reported by the agent-side profiler, if any.
    #[serde(default)]
    pub error: Option<String>,
}

/// Service listing response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListServicesResponse {
    /// Services currently running on the agent's host.
    pub services: Vec<ServiceInfo>,
}

/// Function metadata response for one service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GetFunctionsResponse {
    /// Functions of the service binary.
    pub functions: Vec<FunctionInfo>,
    /// Content identifier of the binary the functions belong to.
    #[serde(default)]
    pub binary_hash: Option<String>,
}

/// The RPC surface every agent exposes over the mesh, as consumed by the
/// colony's pollers. One implementation speaks HTTP; tests substitute mocks.
#[async_trait]
pub trait AgentApi: Send + Sync + Debug {
    /// Pull telemetry spans after `start_seq_id`. Standard timeout.
    async fn query_telemetry(
        &self,
        req: QueryTelemetryRequest,
    ) -> Result<QueryTelemetryResponse, AgentApiError>;

    /// Pull the four Beyla sub-streams in one call. Standard timeout.
    async fn query_ebpf_metrics(
        &self,
        req: QueryEbpfMetricsRequest,
    ) -> Result<QueryEbpfMetricsResponse, AgentApiError>;

    /// Pull host system metrics. Standard timeout.
    async fn query_system_metrics(
        &self,
        req: QuerySystemMetricsRequest,
    ) -> Result<QuerySystemMetricsResponse, AgentApiError>;

    /// Pull memory-profile samples. Standard timeout.
    async fn query_memory_profile_samples(
        &self,
        req: QueryMemoryProfileSamplesRequest,
    ) -> Result<QueryMemoryProfileSamplesResponse, AgentApiError>;

    /// List services on the agent's host. Real-time timeout.
    async fn list_services(&self) -> Result<ListServicesResponse, AgentApiError>;

    /// Fetch function metadata for one service. Long timeout.
    async fn get_functions(
        &self,
        service_name: &str,
    ) -> Result<GetFunctionsResponse, AgentApiError>;
}

/// Builds (and may cache) one [`AgentApi`] channel per agent, addressed by
/// its mesh IP.
pub trait AgentConnector: Send + Sync + Debug {
    /// Open or reuse a channel to the given agent.
    fn connect(&self, agent: &AgentEntry) -> Arc<dyn AgentApi>;
}

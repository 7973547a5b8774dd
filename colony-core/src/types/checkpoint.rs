use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// How long a missing seq-id must be missing (judged by the timestamp of the
/// record that exposes the hole) before we call it a gap. Concurrent writers
/// on the agent commit out of seq-id order within this window.
pub const SEQ_GAP_GRACE: Duration = Duration::from_secs(10);

/// The independent data streams a colony pulls from every agent. Each stream
/// checkpoints separately; the four Beyla streams share one RPC and session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// OTLP spans captured by the agent's telemetry receiver.
    Telemetry,
    /// eBPF HTTP request metrics, bucketed at source.
    BeylaHttp,
    /// eBPF gRPC request metrics.
    BeylaGrpc,
    /// eBPF SQL statement metrics.
    BeylaSql,
    /// eBPF-captured trace spans.
    BeylaTraces,
    /// Heap allocation profile samples.
    MemoryProfile,
    /// Host system metrics (cpu, memory, disk, ...).
    SystemMetrics,
}

impl DataType {
    /// All checkpointed stream types.
    pub const ALL: [DataType; 7] = [
        DataType::Telemetry,
        DataType::BeylaHttp,
        DataType::BeylaGrpc,
        DataType::BeylaSql,
        DataType::BeylaTraces,
        DataType::MemoryProfile,
        DataType::SystemMetrics,
    ];

    /// The four sub-streams served by the shared Beyla RPC.
    pub const BEYLA: [DataType; 4] = [
        DataType::BeylaHttp,
        DataType::BeylaGrpc,
        DataType::BeylaSql,
        DataType::BeylaTraces,
    ];

    /// Stable string key used in the checkpoint and gap tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Telemetry => "telemetry",
            DataType::BeylaHttp => "beyla_http",
            DataType::BeylaGrpc => "beyla_grpc",
            DataType::BeylaSql => "beyla_sql",
            DataType::BeylaTraces => "beyla_traces",
            DataType::MemoryProfile => "memory_profile",
            DataType::SystemMetrics => "system_metrics",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable position of a poller within one agent's stream.
///
/// `last_seq_id` is monotone non-decreasing per `(agent_id, data_type)` and
/// is advanced only after the aggregates it covers are durably written; the
/// store does not enforce either, the pollers do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollingCheckpoint {
    /// Agent the checkpoint belongs to.
    pub agent_id: String,
    /// Stream the checkpoint belongs to.
    pub data_type: DataType,
    /// Session the seq-ids are ordered within. Changes when the agent's
    /// local store is recreated.
    pub session_id: String,
    /// Highest seq-id whose derived aggregates are committed.
    pub last_seq_id: u64,
    /// Last time the row was written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Status of a recorded sequence gap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapStatus {
    /// The hole was observed and is still open.
    Detected,
    /// A later sweep found the range present or expired it.
    Recovered,
}

impl GapStatus {
    /// Stable string key used in the gap table.
    pub fn as_str(&self) -> &'static str {
        match self {
            GapStatus::Detected => "detected",
            GapStatus::Recovered => "recovered",
        }
    }
}

/// A contiguous inclusive interval of seq-ids known to be missing between two
/// successfully received records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceGap {
    /// Ledger row id, assigned on insert.
    pub id: i64,
    /// Agent the gap was observed on.
    pub agent_id: String,
    /// Stream the gap was observed in.
    pub data_type: DataType,
    /// First missing seq-id.
    pub start_seq_id: u64,
    /// Last missing seq-id.
    pub end_seq_id: u64,
    /// Open or recovered.
    pub status: GapStatus,
    /// When the gap was first recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

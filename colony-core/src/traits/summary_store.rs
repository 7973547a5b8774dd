use async_trait::async_trait;
use eyre::Result;

use crate::{
    BeylaHttpSummary, BinaryVersion, Hotspot, SystemMetricSummary, TelemetrySummary,
};

/// Kind of profile a hotspot query runs against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProfileKind {
    /// On-CPU samples.
    Cpu,
    /// Heap allocation samples.
    Memory,
}

/// Narrow read facade the unified query engine is written against, so unit
/// tests can substitute a fake without touching the storage engine.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// eBPF HTTP summaries overlapping `[start, end]`, optionally filtered
    /// to one service.
    async fn beyla_http_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<BeylaHttpSummary>>;

    /// OTLP telemetry summaries with `bucket_minute` in `[start, end]`.
    async fn telemetry_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<TelemetrySummary>>;

    /// Host system metric summaries with `bucket_minute` in `[start, end]`.
    async fn system_metric_summaries(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<SystemMetricSummary>>;

    /// All registered services as `(service_name, agent_id)` pairs, so host
    /// metrics can be attached to the services running on each agent.
    async fn registered_services(&self) -> Result<Vec<(String, String)>>;

    /// Top-k hotspots for a service in `[start, end]`, with the window's
    /// total sample count (cpu) or total allocated bytes (memory).
    /// `build_id` restricts to one binary when given.
    async fn top_k_hotspots(
        &self,
        kind: ProfileKind,
        service: &str,
        build_id: Option<&str>,
        start: i64,
        end: i64,
        top_k: usize,
    ) -> Result<(u64, Vec<Hotspot>)>;

    /// Known binary versions of a service, newest first.
    async fn binary_versions(&self, service: &str) -> Result<Vec<BinaryVersion>>;
}

use async_trait::async_trait;
use eyre::Result;

use colony_core::{
    BeylaHttpSummary, BinaryVersion, Hotspot, ProfileKind, SummaryStore, SystemMetricSummary,
    TelemetrySummary,
};

use crate::db::ColonyDb;

#[async_trait]
impl SummaryStore for ColonyDb {
    async fn beyla_http_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<BeylaHttpSummary>> {
        self.beyla_http_summaries_in_range(service, start, end).await
    }

    async fn telemetry_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<TelemetrySummary>> {
        self.telemetry_summaries_in_range(service, start, end).await
    }

    async fn system_metric_summaries(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<SystemMetricSummary>> {
        self.system_metric_summaries_in_range(start, end).await
    }

    async fn registered_services(&self) -> Result<Vec<(String, String)>> {
        self.registered_service_agents().await
    }

    async fn top_k_hotspots(
        &self,
        kind: ProfileKind,
        service: &str,
        build_id: Option<&str>,
        start: i64,
        end: i64,
        top_k: usize,
    ) -> Result<(u64, Vec<Hotspot>)> {
        self.top_k_hotspots_for(kind, service, build_id, start, end, top_k)
            .await
    }

    async fn binary_versions(&self, service: &str) -> Result<Vec<BinaryVersion>> {
        self.binary_versions_for(service).await
    }
}

#![allow(non_snake_case)]

use async_trait::async_trait;
use eyre::Result;
use mockall::*;

use colony_core::*;

mock! {
    pub SummaryStore {
        pub fn _beyla_http_summaries(
            &self,
            service: Option<String>,
            start: i64,
            end: i64,
        ) -> Result<Vec<BeylaHttpSummary>>;

        pub fn _telemetry_summaries(
            &self,
            service: Option<String>,
            start: i64,
            end: i64,
        ) -> Result<Vec<TelemetrySummary>>;

        pub fn _system_metric_summaries(&self, start: i64, end: i64) -> Result<Vec<SystemMetricSummary>>;

        pub fn _registered_services(&self) -> Result<Vec<(String, String)>>;

        pub fn _top_k_hotspots(
            &self,
            kind: ProfileKind,
            service: String,
            build_id: Option<String>,
            start: i64,
            end: i64,
            top_k: usize,
        ) -> Result<(u64, Vec<Hotspot>)>;

        pub fn _binary_versions(&self, service: String) -> Result<Vec<BinaryVersion>>;
    }
}

#[async_trait]
impl SummaryStore for MockSummaryStore {
    async fn beyla_http_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<BeylaHttpSummary>> {
        self._beyla_http_summaries(service.map(str::to_owned), start, end)
    }

    async fn telemetry_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<TelemetrySummary>> {
        self._telemetry_summaries(service.map(str::to_owned), start, end)
    }

    async fn system_metric_summaries(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<SystemMetricSummary>> {
        self._system_metric_summaries(start, end)
    }

    async fn registered_services(&self) -> Result<Vec<(String, String)>> {
        self._registered_services()
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
        self._top_k_hotspots(
            kind,
            service.to_owned(),
            build_id.map(str::to_owned),
            start,
            end,
            top_k,
        )
    }

    async fn binary_versions(&self, service: &str) -> Result<Vec<BinaryVersion>> {
        self._binary_versions(service.to_owned())
    }
}

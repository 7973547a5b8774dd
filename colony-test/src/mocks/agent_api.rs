#![allow(non_snake_case)]

use std::sync::Arc;

use async_trait::async_trait;
use mockall::*;

use colony_core::*;

mock! {
    pub AgentRpc {
        pub fn _query_telemetry(
            &self,
            req: QueryTelemetryRequest,
        ) -> Result<QueryTelemetryResponse, AgentApiError>;

        pub fn _query_ebpf_metrics(
            &self,
            req: QueryEbpfMetricsRequest,
        ) -> Result<QueryEbpfMetricsResponse, AgentApiError>;

        pub fn _query_system_metrics(
            &self,
            req: QuerySystemMetricsRequest,
        ) -> Result<QuerySystemMetricsResponse, AgentApiError>;

        pub fn _query_memory_profile_samples(
            &self,
            req: QueryMemoryProfileSamplesRequest,
        ) -> Result<QueryMemoryProfileSamplesResponse, AgentApiError>;

        pub fn _list_services(&self) -> Result<ListServicesResponse, AgentApiError>;

        pub fn _get_functions(
            &self,
            service_name: String,
        ) -> Result<GetFunctionsResponse, AgentApiError>;
    }
}

impl std::fmt::Debug for MockAgentRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockAgentRpc")
    }
}

#[async_trait]
impl AgentApi for MockAgentRpc {
    async fn query_telemetry(
        &self,
        req: QueryTelemetryRequest,
    ) -> Result<QueryTelemetryResponse, AgentApiError> {
        self._query_telemetry(req)
    }

    async fn query_ebpf_metrics(
        &self,
        req: QueryEbpfMetricsRequest,
    ) -> Result<QueryEbpfMetricsResponse, AgentApiError> {
        self._query_ebpf_metrics(req)
    }

    async fn query_system_metrics(
        &self,
        req: QuerySystemMetricsRequest,
    ) -> Result<QuerySystemMetricsResponse, AgentApiError> {
        self._query_system_metrics(req)
    }

    async fn query_memory_profile_samples(
        &self,
        req: QueryMemoryProfileSamplesRequest,
    ) -> Result<QueryMemoryProfileSamplesResponse, AgentApiError> {
        self._query_memory_profile_samples(req)
    }

    async fn list_services(&self) -> Result<ListServicesResponse, AgentApiError> {
        self._list_services()
    }

    async fn get_functions(
        &self,
        service_name: &str,
    ) -> Result<GetFunctionsResponse, AgentApiError> {
        self._get_functions(service_name.to_owned())
    }
}

/// Connector that hands every agent the same channel. Lets a test drive all
/// pollable agents through one scripted mock.
#[derive(Clone)]
pub struct StaticConnector(pub Arc<dyn AgentApi>);

impl std::fmt::Debug for StaticConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StaticConnector")
    }
}

impl AgentConnector for StaticConnector {
    fn connect(&self, _agent: &AgentEntry) -> Arc<dyn AgentApi> {
        self.0.clone()
    }
}

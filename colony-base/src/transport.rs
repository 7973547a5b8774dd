use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use colony_core::{
    AgentApi, AgentApiError, AgentConnector, AgentEntry, GetFunctionsResponse,
    ListServicesResponse, QueryEbpfMetricsRequest, QueryEbpfMetricsResponse,
    QueryMemoryProfileSamplesRequest, QueryMemoryProfileSamplesResponse,
    QuerySystemMetricsRequest, QuerySystemMetricsResponse, QueryTelemetryRequest,
    QueryTelemetryResponse, LONG_RPC_TIMEOUT, REALTIME_RPC_TIMEOUT, STANDARD_RPC_TIMEOUT,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// JSON-over-HTTP client for one agent's RPC surface, bound to
/// `http://{mesh_ipv4}:{agent_port}`. Each call carries the timeout budget
/// of its class: real-time for listings, standard for data pulls, long for
/// function metadata.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    base_url: String,
    client: Client,
}

impl HttpAgentClient {
    /// Build a client for the given agent address.
    pub fn new(mesh_ipv4: std::net::Ipv4Addr, agent_port: u16) -> Result<Self, AgentApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AgentApiError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: format!("http://{mesh_ipv4}:{agent_port}"),
            client,
        })
    }

    async fn post<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
        timeout: Duration,
    ) -> Result<Resp, AgentApiError> {
        let url = format!("{}{path}", self.base_url);
        trace!(%url, "agent rpc");
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentApiError::Timeout(timeout)
                } else {
                    AgentApiError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentApiError::Remote(format!("{status}: {body}")));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| AgentApiError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl AgentApi for HttpAgentClient {
    async fn query_telemetry(
        &self,
        req: QueryTelemetryRequest,
    ) -> Result<QueryTelemetryResponse, AgentApiError> {
        self.post("/rpc/v1/query_telemetry", &req, STANDARD_RPC_TIMEOUT)
            .await
    }

    async fn query_ebpf_metrics(
        &self,
        req: QueryEbpfMetricsRequest,
    ) -> Result<QueryEbpfMetricsResponse, AgentApiError> {
        self.post("/rpc/v1/query_ebpf_metrics", &req, STANDARD_RPC_TIMEOUT)
            .await
    }

    async fn query_system_metrics(
        &self,
        req: QuerySystemMetricsRequest,
    ) -> Result<QuerySystemMetricsResponse, AgentApiError> {
        self.post("/rpc/v1/query_system_metrics", &req, STANDARD_RPC_TIMEOUT)
            .await
    }

    async fn query_memory_profile_samples(
        &self,
        req: QueryMemoryProfileSamplesRequest,
    ) -> Result<QueryMemoryProfileSamplesResponse, AgentApiError> {
        self.post(
            "/rpc/v1/query_memory_profile_samples",
            &req,
            STANDARD_RPC_TIMEOUT,
        )
        .await
    }

    async fn list_services(&self) -> Result<ListServicesResponse, AgentApiError> {
        self.post(
            "/rpc/v1/list_services",
            &serde_json::json!({}),
            REALTIME_RPC_TIMEOUT,
        )
        .await
    }

    async fn get_functions(
        &self,
        service_name: &str,
    ) -> Result<GetFunctionsResponse, AgentApiError> {
        self.post(
            "/rpc/v1/get_functions",
            &serde_json::json!({ "service_name": service_name }),
            LONG_RPC_TIMEOUT,
        )
        .await
    }
}

/// Builds one [`HttpAgentClient`] per agent and reuses it across cycles.
/// Channels are rebuilt when an agent's mesh address changes.
#[derive(Debug)]
pub struct HttpAgentConnector {
    agent_port: u16,
    channels: RwLock<HashMap<String, (std::net::Ipv4Addr, Arc<HttpAgentClient>)>>,
}

impl HttpAgentConnector {
    /// Connector for agents listening on `agent_port`.
    pub fn new(agent_port: u16) -> Self {
        Self {
            agent_port,
            channels: RwLock::new(HashMap::new()),
        }
    }
}

impl AgentConnector for HttpAgentConnector {
    fn connect(&self, agent: &AgentEntry) -> Arc<dyn AgentApi> {
        {
            let channels = self.channels.read().expect("connector lock poisoned");
            if let Some((addr, client)) = channels.get(&agent.agent_id) {
                if *addr == agent.mesh_ipv4 {
                    return client.clone();
                }
            }
        }

        let client = Arc::new(
            HttpAgentClient::new(agent.mesh_ipv4, self.agent_port)
                .expect("reqwest client construction is infallible with static config"),
        );
        self.channels
            .write()
            .expect("connector lock poisoned")
            .insert(agent.agent_id.clone(), (agent.mesh_ipv4, client.clone()));
        client
    }
}

//! The colony HTTP API: status, agent listing, mesh topology and unified
//! service summaries.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing, Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

use colony_base::AgentRegistry;
use colony_core::AgentStatus;

use crate::summary::UnifiedQueryEngine;

#[derive(Clone)]
struct ApiState {
    colony_id: String,
    started_at: OffsetDateTime,
    registry: Arc<AgentRegistry>,
    engine: Arc<UnifiedQueryEngine>,
}

/// The colony's exposed RPC surface.
pub struct ColonyApi {
    state: ApiState,
}

impl ColonyApi {
    /// Constructor.
    pub fn new(
        colony_id: String,
        registry: Arc<AgentRegistry>,
        engine: Arc<UnifiedQueryEngine>,
    ) -> Self {
        Self {
            state: ApiState {
                colony_id,
                started_at: OffsetDateTime::now_utc(),
                registry,
                engine,
            },
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/status", routing::get(get_status))
            .route("/agents", routing::get(list_agents))
            .route("/topology", routing::get(get_topology))
            .route("/summary", routing::get(get_summary))
            .with_state(self.state.clone())
    }

    /// Serve the API on `0.0.0.0:{port}`.
    pub fn serve(&self, port: u16) -> JoinHandle<()> {
        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        info!(%addr, "starting colony api");
        tokio::spawn(
            async move {
                if let Err(e) = axum::Server::bind(&addr)
                    .serve(router.into_make_service())
                    .await
                {
                    tracing::error!(error = %e, "colony api server exited");
                }
            }
            .instrument(info_span!("colony_api")),
        )
    }
}

async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    let (healthy, degraded, unhealthy) = state.registry.census(now);
    Json(serde_json::json!({
        "colony_id": state.colony_id,
        "uptime_seconds": (now - state.started_at).whole_seconds(),
        "agents": {
            "healthy": healthy,
            "degraded": degraded,
            "unhealthy": unhealthy,
        },
    }))
}

async fn list_agents(State(state): State<ApiState>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    let agents: Vec<_> = state
        .registry
        .list_all()
        .into_iter()
        .map(|agent| {
            let status = agent.status(now);
            serde_json::json!({
                "agent_id": agent.agent_id,
                "mesh_ipv4": agent.mesh_ipv4,
                "last_seen": agent.last_seen.unix_timestamp(),
                "status": status,
            })
        })
        .collect();
    Json(serde_json::json!({ "agents": agents }))
}

async fn get_topology(State(state): State<ApiState>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    let nodes: Vec<_> = state
        .registry
        .list_all()
        .into_iter()
        .map(|agent| {
            let status = agent.status(now);
            serde_json::json!({
                "agent_id": agent.agent_id,
                "mesh_ipv4": agent.mesh_ipv4,
                "status": status,
                "reachable": status != AgentStatus::Unhealthy,
                "services": agent.services,
            })
        })
        .collect();
    Json(serde_json::json!({ "colony_id": state.colony_id, "nodes": nodes }))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    service: Option<String>,
    start: i64,
    end: i64,
}

async fn get_summary(
    State(state): State<ApiState>,
    Query(params): Query<SummaryParams>,
) -> impl IntoResponse {
    match state
        .engine
        .unified_summaries(params.service.as_deref(), params.start, params.end)
        .await
    {
        Ok(summaries) => Json(serde_json::json!({ "summaries": summaries })).into_response(),
        Err(report) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("summary query failed: {report:#}"),
        )
            .into_response(),
    }
}

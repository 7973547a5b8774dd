use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Default port agents expose their RPC surface on, reachable over the mesh.
pub const AGENT_RPC_PORT: u16 = 9411;

/// An agent is considered healthy if it reported within this window.
pub const HEALTHY_WINDOW: Duration = Duration::from_secs(30);

/// Past the healthy window but within this one, the agent is degraded and
/// still polled so it gets a chance to drain.
pub const DEGRADED_WINDOW: Duration = Duration::from_secs(120);

/// Health classification of an agent, derived purely from last-seen age.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Reported within [`HEALTHY_WINDOW`].
    Healthy,
    /// Reported within [`DEGRADED_WINDOW`].
    Degraded,
    /// Not heard from for longer than [`DEGRADED_WINDOW`]; never contacted.
    Unhealthy,
}

impl AgentStatus {
    /// Classify from a last-seen timestamp against `now`. Time-only on
    /// purpose: transient network loss should not look like churn.
    pub fn from_last_seen(last_seen: OffsetDateTime, now: OffsetDateTime) -> Self {
        let age = now - last_seen;
        if age <= HEALTHY_WINDOW {
            Self::Healthy
        } else if age <= DEGRADED_WINDOW {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }

    /// Pollers contact healthy and degraded agents only.
    pub fn is_pollable(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// A service advertised by an agent for the processes on its host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name as discovered on the host.
    pub name: String,
    /// Content identifier of the running binary, when symbolization found one.
    #[serde(default)]
    pub binary_hash: Option<String>,
    /// Language runtime detected for the process, if any.
    #[serde(default)]
    pub language: Option<String>,
    /// Host pid of the main process.
    #[serde(default)]
    pub pid: Option<u32>,
}

/// In-memory registry entry for a known agent. Produced by the registration
/// path; consumed read-only by the pollers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Stable identity minted at enrollment.
    pub agent_id: String,
    /// Address of the agent on the mesh overlay.
    pub mesh_ipv4: Ipv4Addr,
    /// Last time the agent checked in.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// Services the agent advertised at its last check-in.
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
    /// Opaque runtime context reported by the agent (kernel, arch, ...).
    #[serde(default)]
    pub runtime_context: serde_json::Value,
}

impl AgentEntry {
    /// Health classification of this entry at `now`.
    pub fn status(&self, now: OffsetDateTime) -> AgentStatus {
        AgentStatus::from_last_seen(self.last_seen, now)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_is_time_only() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let fresh = now - Duration::from_secs(5);
        let stale = now - Duration::from_secs(60);
        let gone = now - Duration::from_secs(600);

        assert_eq!(AgentStatus::from_last_seen(fresh, now), AgentStatus::Healthy);
        assert_eq!(AgentStatus::from_last_seen(stale, now), AgentStatus::Degraded);
        assert_eq!(AgentStatus::from_last_seen(gone, now), AgentStatus::Unhealthy);
        assert!(!AgentStatus::Unhealthy.is_pollable());
    }

    #[test]
    fn boundaries_are_inclusive() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(
            AgentStatus::from_last_seen(now - HEALTHY_WINDOW, now),
            AgentStatus::Healthy
        );
        assert_eq!(
            AgentStatus::from_last_seen(now - DEGRADED_WINDOW, now),
            AgentStatus::Degraded
        );
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use time::OffsetDateTime;
use tracing::debug;

use colony_core::{AgentEntry, AgentStatus};

/// In-memory catalogue of known agents: identity, mesh address, last-seen,
/// advertised services. Written by the registration path, read by the
/// pollers and the colony API.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentEntry>>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an agent entry. This is the registration
    /// entry-point; everything else is read-only.
    pub fn upsert(&self, entry: AgentEntry) {
        debug!(agent_id = %entry.agent_id, "registry upsert");
        self.agents
            .write()
            .expect("registry lock poisoned")
            .insert(entry.agent_id.clone(), entry);
    }

    /// Snapshot of all known agents, in stable id order.
    pub fn list_all(&self) -> Vec<AgentEntry> {
        let mut agents: Vec<_> = self
            .agents
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    /// Look up one agent by id.
    pub fn get(&self, agent_id: &str) -> Option<AgentEntry> {
        self.agents
            .read()
            .expect("registry lock poisoned")
            .get(agent_id)
            .cloned()
    }

    /// Health classification of an agent's last-seen timestamp at `now`.
    /// Time-only; see [`AgentStatus::from_last_seen`].
    pub fn determine_status(&self, last_seen: OffsetDateTime, now: OffsetDateTime) -> AgentStatus {
        AgentStatus::from_last_seen(last_seen, now)
    }

    /// Census of agents by status at `now`: `(healthy, degraded, unhealthy)`.
    pub fn census(&self, now: OffsetDateTime) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for agent in self.agents.read().expect("registry lock poisoned").values() {
            match agent.status(now) {
                AgentStatus::Healthy => counts.0 += 1,
                AgentStatus::Degraded => counts.1 += 1,
                AgentStatus::Unhealthy => counts.2 += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::time::Duration;

    fn entry(id: &str, last_seen: OffsetDateTime) -> AgentEntry {
        AgentEntry {
            agent_id: id.into(),
            mesh_ipv4: "10.8.0.2".parse().unwrap(),
            last_seen,
            services: vec![],
            runtime_context: serde_json::Value::Null,
        }
    }

    #[test]
    fn upsert_replaces_and_list_is_ordered() {
        let now = OffsetDateTime::now_utc();
        let registry = AgentRegistry::new();
        registry.upsert(entry("b", now));
        registry.upsert(entry("a", now));
        registry.upsert(entry("b", now - Duration::from_secs(5)));

        let all = registry.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].agent_id, "a");
        assert_eq!(all[1].agent_id, "b");
        assert_eq!(registry.get("b").unwrap().last_seen, now - Duration::from_secs(5));
    }

    #[test]
    fn census_buckets_by_age() {
        let now = OffsetDateTime::now_utc();
        let registry = AgentRegistry::new();
        registry.upsert(entry("fresh", now));
        registry.upsert(entry("stale", now - Duration::from_secs(60)));
        registry.upsert(entry("gone", now - Duration::from_secs(900)));

        assert_eq!(registry.census(now), (1, 1, 1));
    }
}

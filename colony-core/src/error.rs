use std::time::Duration;

/// Errors surfaced when talking to an agent over the mesh.
///
/// Transport and timeout failures are per-agent and retried on the next
/// poll cycle; protocol and remote errors are logged with the agent id and
/// the agent is skipped for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum AgentApiError {
    /// The connection could not be established or broke mid-request.
    #[error("transport error talking to agent: {0}")]
    Transport(String),
    /// The request exceeded its timeout budget.
    #[error("agent request timed out after {0:?}")]
    Timeout(Duration),
    /// The agent answered with something we could not decode.
    #[error("malformed agent response: {0}")]
    Protocol(String),
    /// The agent answered with its error field set.
    #[error("agent reported error: {0}")]
    Remote(String),
}

impl AgentApiError {
    /// Whether the failure is worth retrying on the next cycle without
    /// operator attention.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

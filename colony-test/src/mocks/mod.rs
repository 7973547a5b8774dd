//! Mock implementations of the colony trait seams.

mod agent_api;
pub use agent_api::{MockAgentRpc, StaticConnector};

mod summary_store;
pub use summary_store::MockSummaryStore;

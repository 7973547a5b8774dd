mod agent_api;
pub use agent_api::*;

mod summary_store;
pub use summary_store::*;

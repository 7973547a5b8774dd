//! Core primitives shared by the colony coordinator and its tooling:
//! domain types for agents, pulled records, aggregates and checkpoints,
//! plus the trait seams (agent RPC surface, summary-store facade) that the
//! pollers and the unified query engine are written against.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

mod error;
pub use error::*;

mod types;
pub use types::*;

mod traits;
pub use traits::*;

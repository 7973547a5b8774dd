//! A small framework for building the colony coordinator: settings loading,
//! tracing setup, Prometheus metrics, the reusable poller skeleton, the
//! agent registry and the HTTP transport to agents.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

mod settings;
pub use settings::*;

/// Base trait for the coordinator process
mod agent;
pub use agent::*;

#[doc(hidden)]
#[macro_use]
pub mod macros;
pub use macros::*;

mod metrics;
pub use metrics::*;

mod poller;
pub use poller::*;

mod registry;
pub use registry::*;

mod transport;
pub use transport::*;

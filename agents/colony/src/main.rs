//! The colony coordinator pulls telemetry, eBPF metrics, traces, memory
//! profiles, host metrics and function metadata from every agent in the
//! mesh, rolls them up into one-minute aggregates in the central analytic
//! store, and serves fleet-wide health summaries over HTTP.
//!
//! Ingestion is strictly pull-based and checkpointed: each stream resumes
//! from its last committed seq-id per agent, detects holes in the sequence,
//! and never advances a checkpoint before the aggregates it covers are
//! durable. Losing the coordinator loses no data; it re-pulls from the
//! agents' local stores on restart.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

use eyre::Result;

use colony_base::agent_main;

use crate::agent::Colony;

mod agent;
mod aggregation;
mod date_time;
mod db;
mod pollers;
mod server;
mod settings;
mod summary;

#[tokio::main]
async fn main() -> Result<()> {
    agent_main::<Colony>().await
}

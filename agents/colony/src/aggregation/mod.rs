//! Stream-specific roll-ups of pulled records into one-minute buckets.

mod telemetry;
pub use telemetry::TelemetryAggregator;

mod ebpf;
pub use ebpf::{aggregate_grpc_metrics, aggregate_http_metrics, aggregate_sql_metrics};

mod system_metrics;
pub use system_metrics::aggregate_system_metrics;

mod frames;
pub use frames::FrameInterner;

mod memory_profile;
pub use memory_profile::aggregate_memory_samples;

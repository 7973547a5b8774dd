//! Hand-maintained `SeaORM` entities for the colony analytic store. Keep in
//! lockstep with the migrations.

pub mod beyla_grpc_summary;
pub mod beyla_http_summary;
pub mod beyla_sql_summary;
pub mod binary_version;
pub mod cpu_profile_summary;
pub mod function;
pub mod memory_profile_summary;
pub mod polling_checkpoint;
pub mod sequence_gap;
pub mod service;
pub mod stack_frame;
pub mod system_metric_summary;
pub mod telemetry_summary;
pub mod trace_span;

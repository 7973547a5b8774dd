pub use sea_orm_migration::prelude::*;

mod m20250115_000001_create_table_services;
mod m20250115_000002_create_table_polling_checkpoints;
mod m20250115_000003_create_table_sequence_gaps;
mod m20250115_000004_create_table_telemetry_summaries;
mod m20250115_000005_create_table_beyla_summaries;
mod m20250115_000006_create_table_trace_spans;
mod m20250115_000007_create_table_system_metric_summaries;
mod m20250115_000008_create_table_profile_summaries;
mod m20250115_000009_create_table_functions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        // Every migration is guarded with if_not_exists so re-opening a
        // populated store is a no-op.
        vec![
            Box::new(m20250115_000001_create_table_services::Migration),
            Box::new(m20250115_000002_create_table_polling_checkpoints::Migration),
            Box::new(m20250115_000003_create_table_sequence_gaps::Migration),
            Box::new(m20250115_000004_create_table_telemetry_summaries::Migration),
            Box::new(m20250115_000005_create_table_beyla_summaries::Migration),
            Box::new(m20250115_000006_create_table_trace_spans::Migration),
            Box::new(m20250115_000007_create_table_system_metric_summaries::Migration),
            Box::new(m20250115_000008_create_table_profile_summaries::Migration),
            Box::new(m20250115_000009_create_table_functions::Migration),
        ]
    }
}

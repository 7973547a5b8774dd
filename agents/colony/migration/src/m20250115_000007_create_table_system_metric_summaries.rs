use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SystemMetricSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemMetricSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SystemMetricSummary::AgentId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SystemMetricSummary::BucketMinute)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SystemMetricSummary::MetricName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SystemMetricSummary::Attributes)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SystemMetricSummary::Kind).text().not_null())
                    .col(ColumnDef::new(SystemMetricSummary::Min).double().not_null())
                    .col(ColumnDef::new(SystemMetricSummary::Max).double().not_null())
                    .col(ColumnDef::new(SystemMetricSummary::Avg).double().not_null())
                    .col(ColumnDef::new(SystemMetricSummary::P95).double().not_null())
                    .col(
                        ColumnDef::new(SystemMetricSummary::Delta)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SystemMetricSummary::SampleCount)
                            .big_integer()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_system_metric_summary_key")
                            .col(SystemMetricSummary::AgentId)
                            .col(SystemMetricSummary::BucketMinute)
                            .col(SystemMetricSummary::MetricName)
                            .col(SystemMetricSummary::Attributes),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemMetricSummary::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SystemMetricSummary {
    Table,
    Id,
    AgentId,
    /// UTC minute, unix seconds
    BucketMinute,
    MetricName,
    /// Canonical JSON encoding of the attribute set
    Attributes,
    /// gauge, counter or delta
    Kind,
    Min,
    Max,
    Avg,
    P95,
    /// max - min for counter/delta metrics, 0 otherwise
    Delta,
    SampleCount,
}

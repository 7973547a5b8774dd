use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TelemetrySummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TelemetrySummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TelemetrySummary::AgentId).text().not_null())
                    .col(
                        ColumnDef::new(TelemetrySummary::BucketMinute)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TelemetrySummary::Service).text().not_null())
                    .col(ColumnDef::new(TelemetrySummary::Kind).text().not_null())
                    .col(ColumnDef::new(TelemetrySummary::P50Ms).double().not_null())
                    .col(ColumnDef::new(TelemetrySummary::P95Ms).double().not_null())
                    .col(ColumnDef::new(TelemetrySummary::P99Ms).double().not_null())
                    .col(
                        ColumnDef::new(TelemetrySummary::TotalSpans)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TelemetrySummary::ErrorCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TelemetrySummary::SampleTraceIds)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TelemetrySummary::TimeCreated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_telemetry_summary_key")
                            .col(TelemetrySummary::AgentId)
                            .col(TelemetrySummary::BucketMinute)
                            .col(TelemetrySummary::Service)
                            .col(TelemetrySummary::Kind),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_telemetry_summary_service_bucket")
                    .table(TelemetrySummary::Table)
                    .col(TelemetrySummary::Service)
                    .col(TelemetrySummary::BucketMinute)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TelemetrySummary::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TelemetrySummary {
    Table,
    Id,
    /// Agent the spans came from
    AgentId,
    /// UTC minute, unix seconds
    BucketMinute,
    /// Owning service
    Service,
    /// Span kind
    Kind,
    P50Ms,
    P95Ms,
    P99Ms,
    /// Spans observed in the bucket
    TotalSpans,
    /// Spans with an error status
    ErrorCount,
    /// JSON list of example trace ids
    SampleTraceIds,
    TimeCreated,
}

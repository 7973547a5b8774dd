use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TraceSpan::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TraceSpan::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TraceSpan::AgentId).text().not_null())
                    .col(ColumnDef::new(TraceSpan::TraceId).text().not_null())
                    .col(ColumnDef::new(TraceSpan::SpanId).text().not_null())
                    .col(ColumnDef::new(TraceSpan::ParentSpanId).text())
                    .col(ColumnDef::new(TraceSpan::Service).text().not_null())
                    .col(ColumnDef::new(TraceSpan::Name).text().not_null())
                    .col(ColumnDef::new(TraceSpan::Kind).text().not_null())
                    .col(
                        ColumnDef::new(TraceSpan::StartTimeUs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TraceSpan::DurationUs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TraceSpan::Status).integer().not_null())
                    .col(ColumnDef::new(TraceSpan::TimeCreated).timestamp().not_null())
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_trace_span_identity")
                            .col(TraceSpan::TraceId)
                            .col(TraceSpan::SpanId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_trace_span_service_start")
                    .table(TraceSpan::Table)
                    .col(TraceSpan::Service)
                    .col(TraceSpan::StartTimeUs)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TraceSpan::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TraceSpan {
    Table,
    Id,
    AgentId,
    TraceId,
    SpanId,
    ParentSpanId,
    Service,
    Name,
    Kind,
    /// Start time, unix microseconds
    StartTimeUs,
    DurationUs,
    /// 0 unset, 1 ok, 2 error
    Status,
    TimeCreated,
}

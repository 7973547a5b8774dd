use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StackFrame::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StackFrame::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StackFrame::Function).text().not_null())
                    .col(ColumnDef::new(StackFrame::Module).text().not_null())
                    .col(ColumnDef::new(StackFrame::File).text().not_null())
                    .col(ColumnDef::new(StackFrame::Line).integer().not_null())
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_stack_frame_identity")
                            .col(StackFrame::Function)
                            .col(StackFrame::Module)
                            .col(StackFrame::File)
                            .col(StackFrame::Line),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MemoryProfileSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MemoryProfileSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::AgentId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::BucketMinute)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::Service)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::BuildId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::StackHash)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::FrameIds)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::AllocBytes)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::AllocObjects)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MemoryProfileSummary::TimeCreated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_memory_profile_summary_key")
                            .col(MemoryProfileSummary::AgentId)
                            .col(MemoryProfileSummary::BucketMinute)
                            .col(MemoryProfileSummary::Service)
                            .col(MemoryProfileSummary::BuildId)
                            .col(MemoryProfileSummary::StackHash),
                    )
                    .to_owned(),
            )
            .await?;

        // Populated by the agent-side cpu profile forwarder; read by the
        // hotspot queries.
        manager
            .create_table(
                Table::create()
                    .table(CpuProfileSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CpuProfileSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CpuProfileSummary::AgentId).text().not_null())
                    .col(
                        ColumnDef::new(CpuProfileSummary::BucketMinute)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CpuProfileSummary::Service).text().not_null())
                    .col(ColumnDef::new(CpuProfileSummary::BuildId).text().not_null())
                    .col(
                        ColumnDef::new(CpuProfileSummary::StackHash)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CpuProfileSummary::FrameIds).text().not_null())
                    .col(
                        ColumnDef::new(CpuProfileSummary::SampleCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CpuProfileSummary::TimeCreated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_cpu_profile_summary_key")
                            .col(CpuProfileSummary::AgentId)
                            .col(CpuProfileSummary::BucketMinute)
                            .col(CpuProfileSummary::Service)
                            .col(CpuProfileSummary::BuildId)
                            .col(CpuProfileSummary::StackHash),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CpuProfileSummary::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemoryProfileSummary::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StackFrame::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum StackFrame {
    Table,
    Id,
    Function,
    Module,
    File,
    Line,
}

#[derive(Iden)]
pub enum MemoryProfileSummary {
    Table,
    Id,
    AgentId,
    BucketMinute,
    Service,
    BuildId,
    /// Hash over the interned frame-id sequence
    StackHash,
    /// JSON list of frame ids, leaf first
    FrameIds,
    AllocBytes,
    AllocObjects,
    TimeCreated,
}

#[derive(Iden)]
pub enum CpuProfileSummary {
    Table,
    Id,
    AgentId,
    BucketMinute,
    Service,
    BuildId,
    StackHash,
    FrameIds,
    SampleCount,
    TimeCreated,
}

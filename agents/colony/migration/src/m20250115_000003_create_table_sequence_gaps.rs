use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SequenceGap::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SequenceGap::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SequenceGap::AgentId).text().not_null())
                    .col(ColumnDef::new(SequenceGap::DataType).text().not_null())
                    .col(
                        ColumnDef::new(SequenceGap::StartSeqId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SequenceGap::EndSeqId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SequenceGap::Status).text().not_null())
                    .col(
                        ColumnDef::new(SequenceGap::TimeCreated)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_gap_agent_data_type_status")
                    .table(SequenceGap::Table)
                    .col(SequenceGap::AgentId)
                    .col(SequenceGap::DataType)
                    .col(SequenceGap::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SequenceGap::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SequenceGap {
    Table,
    Id,
    /// Agent the gap was observed on
    AgentId,
    /// Stream the gap was observed in
    DataType,
    /// First missing seq-id
    StartSeqId,
    /// Last missing seq-id
    EndSeqId,
    /// detected or recovered
    Status,
    /// When the gap was first recorded
    TimeCreated,
}

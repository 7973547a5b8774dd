use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollingCheckpoint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollingCheckpoint::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollingCheckpoint::AgentId).text().not_null())
                    .col(
                        ColumnDef::new(PollingCheckpoint::DataType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollingCheckpoint::SessionId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollingCheckpoint::LastSeqId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollingCheckpoint::TimeUpdated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_checkpoint_agent_data_type")
                            .col(PollingCheckpoint::AgentId)
                            .col(PollingCheckpoint::DataType),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollingCheckpoint::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PollingCheckpoint {
    Table,
    Id,
    /// Agent the checkpoint belongs to
    AgentId,
    /// Stream the checkpoint belongs to
    DataType,
    /// Session the seq-ids are ordered within
    SessionId,
    /// Highest seq-id whose aggregates are committed
    LastSeqId,
    /// Time of the last advance
    TimeUpdated,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Service::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Service::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Service::Name).text().not_null())
                    .col(ColumnDef::new(Service::AgentId).text().not_null())
                    .col(ColumnDef::new(Service::BinaryHash).text())
                    .col(ColumnDef::new(Service::Language).text())
                    .col(ColumnDef::new(Service::Status).text().not_null())
                    .col(ColumnDef::new(Service::TimeUpdated).timestamp().not_null())
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_service_name_agent")
                            .col(Service::Name)
                            .col(Service::AgentId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Service::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Service {
    Table,
    Id,
    /// Service name as advertised by the agent
    Name,
    /// Agent that advertised the service
    AgentId,
    /// Content identifier of the running binary
    BinaryHash,
    /// Language runtime detected for the process
    Language,
    /// active or retired
    Status,
    /// Time of the last reconciliation
    TimeUpdated,
}

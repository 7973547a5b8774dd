use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BeylaHttpSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BeylaHttpSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BeylaHttpSummary::Service).text().not_null())
                    .col(ColumnDef::new(BeylaHttpSummary::Method).text().not_null())
                    .col(ColumnDef::new(BeylaHttpSummary::Route).text().not_null())
                    .col(
                        ColumnDef::new(BeylaHttpSummary::StatusCode)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BeylaHttpSummary::Buckets).text().not_null())
                    .col(ColumnDef::new(BeylaHttpSummary::Counts).text().not_null())
                    .col(
                        ColumnDef::new(BeylaHttpSummary::RequestCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BeylaHttpSummary::TimeUpdated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_beyla_http_key")
                            .col(BeylaHttpSummary::Service)
                            .col(BeylaHttpSummary::Method)
                            .col(BeylaHttpSummary::Route)
                            .col(BeylaHttpSummary::StatusCode),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BeylaGrpcSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BeylaGrpcSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BeylaGrpcSummary::Service).text().not_null())
                    .col(ColumnDef::new(BeylaGrpcSummary::Method).text().not_null())
                    .col(
                        ColumnDef::new(BeylaGrpcSummary::StatusCode)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BeylaGrpcSummary::Buckets).text().not_null())
                    .col(ColumnDef::new(BeylaGrpcSummary::Counts).text().not_null())
                    .col(
                        ColumnDef::new(BeylaGrpcSummary::RequestCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BeylaGrpcSummary::TimeUpdated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_beyla_grpc_key")
                            .col(BeylaGrpcSummary::Service)
                            .col(BeylaGrpcSummary::Method)
                            .col(BeylaGrpcSummary::StatusCode),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BeylaSqlSummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BeylaSqlSummary::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BeylaSqlSummary::Service).text().not_null())
                    .col(ColumnDef::new(BeylaSqlSummary::Operation).text().not_null())
                    .col(ColumnDef::new(BeylaSqlSummary::TableName).text().not_null())
                    .col(ColumnDef::new(BeylaSqlSummary::Buckets).text().not_null())
                    .col(ColumnDef::new(BeylaSqlSummary::Counts).text().not_null())
                    .col(
                        ColumnDef::new(BeylaSqlSummary::RequestCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BeylaSqlSummary::TimeUpdated)
                            .timestamp()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_beyla_sql_key")
                            .col(BeylaSqlSummary::Service)
                            .col(BeylaSqlSummary::Operation)
                            .col(BeylaSqlSummary::TableName),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BeylaHttpSummary::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BeylaGrpcSummary::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BeylaSqlSummary::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BeylaHttpSummary {
    Table,
    Id,
    Service,
    Method,
    Route,
    StatusCode,
    /// JSON list of bucket upper bounds, milliseconds
    Buckets,
    /// JSON list of per-bucket counts
    Counts,
    RequestCount,
    TimeUpdated,
}

#[derive(Iden)]
pub enum BeylaGrpcSummary {
    Table,
    Id,
    Service,
    Method,
    StatusCode,
    Buckets,
    Counts,
    RequestCount,
    TimeUpdated,
}

#[derive(Iden)]
pub enum BeylaSqlSummary {
    Table,
    Id,
    Service,
    Operation,
    TableName,
    Buckets,
    Counts,
    RequestCount,
    TimeUpdated,
}

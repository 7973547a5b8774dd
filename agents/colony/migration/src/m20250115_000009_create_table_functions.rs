use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Function::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Function::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Function::ServiceName).text().not_null())
                    .col(ColumnDef::new(Function::FunctionName).text().not_null())
                    .col(ColumnDef::new(Function::Package).text().not_null())
                    .col(ColumnDef::new(Function::FilePath).text().not_null())
                    .col(ColumnDef::new(Function::Line).integer().not_null())
                    .col(ColumnDef::new(Function::Offset).big_integer().not_null())
                    .col(ColumnDef::new(Function::HasDwarf).boolean().not_null())
                    .col(ColumnDef::new(Function::BinaryHash).text().not_null())
                    // 384-element vector, JSON-encoded; similarity is
                    // evaluated colony-side.
                    .col(ColumnDef::new(Function::Embedding).text())
                    .col(ColumnDef::new(Function::LastSeen).timestamp().not_null())
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_function_identity")
                            .col(Function::ServiceName)
                            .col(Function::FunctionName)
                            .col(Function::BinaryHash),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BinaryVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BinaryVersion::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BinaryVersion::Service).text().not_null())
                    .col(ColumnDef::new(BinaryVersion::BuildId).text().not_null())
                    .col(
                        ColumnDef::new(BinaryVersion::FirstSeen)
                            .big_integer()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_binary_version_identity")
                            .col(BinaryVersion::Service)
                            .col(BinaryVersion::BuildId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BinaryVersion::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Function::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Function {
    Table,
    Id,
    ServiceName,
    FunctionName,
    Package,
    FilePath,
    Line,
    Offset,
    HasDwarf,
    BinaryHash,
    /// Write-once; never touched by upserts
    Embedding,
    LastSeen,
}

#[derive(Iden)]
pub enum BinaryVersion {
    Table,
    Id,
    Service,
    BuildId,
    /// Unix seconds the colony first saw the build
    FirstSeen,
}

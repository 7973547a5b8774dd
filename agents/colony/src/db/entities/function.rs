use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "function")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub service_name: String,
    pub function_name: String,
    pub package: String,
    pub file_path: String,
    pub line: i32,
    pub offset: i64,
    pub has_dwarf: bool,
    pub binary_hash: String,
    /// JSON-encoded 384-element vector; write-once
    pub embedding: Option<String>,
    pub last_seen: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

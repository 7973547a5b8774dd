use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "beyla_http_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub service: String,
    pub method: String,
    pub route: String,
    pub status_code: i32,
    /// JSON list of bucket upper bounds, milliseconds
    pub buckets: String,
    /// JSON list of per-bucket counts
    pub counts: String,
    pub request_count: i64,
    pub time_updated: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

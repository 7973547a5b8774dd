use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "system_metric_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub agent_id: String,
    pub bucket_minute: i64,
    pub metric_name: String,
    /// Canonical JSON encoding of the attribute set
    pub attributes: String,
    pub kind: String,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
    pub delta: f64,
    pub sample_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

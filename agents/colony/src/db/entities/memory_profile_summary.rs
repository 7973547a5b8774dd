use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "memory_profile_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub agent_id: String,
    pub bucket_minute: i64,
    pub service: String,
    pub build_id: String,
    pub stack_hash: String,
    /// JSON list of frame ids, leaf first
    pub frame_ids: String,
    pub alloc_bytes: i64,
    pub alloc_objects: i64,
    pub time_created: TimeDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

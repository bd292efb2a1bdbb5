use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "preprint_file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub preprint_id: i32,
    /// Path relative to the files root, `repos/{preprint_id}/{stored name}`.
    #[sea_orm(unique)]
    pub file: String,
    pub original_filename: String,
    pub uploaded: DateTime,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

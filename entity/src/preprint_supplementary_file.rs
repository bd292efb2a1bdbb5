use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "preprint_supplementary_file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub preprint_id: i32,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub label: String,
    pub order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "preprint_subject")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub preprint_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub subject_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::preprint::Entity",
        from = "Column::PreprintId",
        to = "super::preprint::Column::Id",
        on_delete = "Cascade"
    )]
    Preprint,
    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id",
        on_delete = "Cascade"
    )]
    Subject,
}

impl ActiveModelBehavior for ActiveModel {}

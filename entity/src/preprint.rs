use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "preprint")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub repository_id: i32,
    pub owner_id: Option<i32>,
    pub licence_id: Option<i32>,
    pub submission_file_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_name = "abstract", column_type = "Text")]
    pub abstract_text: String,
    pub stage: String,
    pub current_step: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments_editor: Option<String>,
    pub preprint_decision_notification: bool,
    /// Resolvable link to a version published elsewhere, e.g. `https://doi.org/...`.
    pub doi: Option<String>,
    /// Working identifier: the minted DOI, or the source-native id until one exists.
    pub preprint_doi: Option<String>,
    pub source_reference: Option<String>,
    pub date_started: Option<DateTime>,
    pub date_submitted: Option<DateTime>,
    pub date_accepted: Option<DateTime>,
    pub date_published: Option<DateTime>,
    pub date_updated: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id"
    )]
    Repository,
    #[sea_orm(
        belongs_to = "super::licence::Entity",
        from = "Column::LicenceId",
        to = "super::licence::Column::Id"
    )]
    Licence,
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::OwnerId",
        to = "super::account::Column::Id"
    )]
    Owner,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl Related<super::licence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Licence.def()
    }
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        super::preprint_subject::Relation::Subject.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::preprint_subject::Relation::Preprint.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

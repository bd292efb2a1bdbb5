use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registration namespace, owner and credentials used when minting identifiers for a
/// repository. Unset credentials fall back to the `EZID_*` environment variables.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "repo_ezid_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub repository_id: i32,
    pub ezid_shoulder: String,
    pub ezid_owner: String,
    pub ezid_username: Option<String>,
    pub ezid_password: Option<String>,
    pub ezid_endpoint_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

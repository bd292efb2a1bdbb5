//! Repository module for repository-level configuration: the repository row itself, its
//! custom field definitions, the licences of its press and its EZID settings.

use crate::models::request::FieldDefinition;
use ::entity::licence::Entity as Licence;
use ::entity::licence::Model as LicenceModel;
use ::entity::repo_ezid_settings::Entity as RepoEzidSettings;
use ::entity::repo_ezid_settings::Model as RepoEzidSettingsModel;
use ::entity::repository::Entity as Repository;
use ::entity::repository::Model as RepositoryModel;
use ::entity::repository_field::ActiveModel as RepositoryFieldActiveModel;
use ::entity::repository_field::Entity as RepositoryField;
use ::entity::repository_field::Model as RepositoryFieldModel;
use async_trait::async_trait;
use entity::{licence, repo_ezid_settings, repository, repository_field};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};

#[derive(Debug, Clone, Default)]
pub struct DBRepositoriesRepo {
    pub db_session: DatabaseConnection,
}

#[async_trait]
pub trait RepositoriesRepo: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryModel>, DbErr>;

    async fn get_by_short_name(&self, short_name: &str) -> Result<Option<RepositoryModel>, DbErr>;

    /// Looks up the field by (repository, name) and creates it with the given order if missing.
    async fn get_or_create_field(
        &self,
        repository_id: i32,
        definition: FieldDefinition,
    ) -> Result<RepositoryFieldModel, DbErr>;

    async fn get_licence_by_name(
        &self,
        press_id: i32,
        name: &str,
    ) -> Result<Option<LicenceModel>, DbErr>;

    async fn get_ezid_settings(
        &self,
        repository_id: i32,
    ) -> Result<Option<RepoEzidSettingsModel>, DbErr>;
}

#[async_trait]
impl RepositoriesRepo for DBRepositoriesRepo {
    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryModel>, DbErr> {
        Repository::find()
            .filter(repository::Column::Name.eq(name))
            .one(&self.db_session)
            .await
    }

    async fn get_by_short_name(&self, short_name: &str) -> Result<Option<RepositoryModel>, DbErr> {
        Repository::find()
            .filter(repository::Column::ShortName.eq(short_name))
            .one(&self.db_session)
            .await
    }

    async fn get_or_create_field(
        &self,
        repository_id: i32,
        definition: FieldDefinition,
    ) -> Result<RepositoryFieldModel, DbErr> {
        let existing = RepositoryField::find()
            .filter(repository_field::Column::RepositoryId.eq(repository_id))
            .filter(repository_field::Column::Name.eq(definition.name))
            .one(&self.db_session)
            .await?;
        if let Some(field) = existing {
            return Ok(field);
        }
        let field = RepositoryFieldActiveModel {
            id: Default::default(),
            repository_id: ActiveValue::Set(repository_id),
            name: ActiveValue::Set(definition.name.to_string()),
            input_type: ActiveValue::Set("text".to_string()),
            required: ActiveValue::Set(false),
            order: ActiveValue::Set(definition.order),
            display: ActiveValue::Set(false),
        };
        field.insert(&self.db_session).await
    }

    async fn get_licence_by_name(
        &self,
        press_id: i32,
        name: &str,
    ) -> Result<Option<LicenceModel>, DbErr> {
        Licence::find()
            .filter(licence::Column::PressId.eq(press_id))
            .filter(licence::Column::Name.eq(name))
            .one(&self.db_session)
            .await
    }

    async fn get_ezid_settings(
        &self,
        repository_id: i32,
    ) -> Result<Option<RepoEzidSettingsModel>, DbErr> {
        RepoEzidSettings::find()
            .filter(repo_ezid_settings::Column::RepositoryId.eq(repository_id))
            .one(&self.db_session)
            .await
    }
}

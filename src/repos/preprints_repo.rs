//! Repository module for preprints and everything hanging off them.
//!
//! Every `get_or_create_*` call looks the row up by its natural key first and only
//! inserts when nothing matches. Existing rows are returned untouched, so a repeated
//! import never overwrites what an earlier run stored.

use crate::models::common::{slugify, WITHDRAWN_STATE};
use crate::models::request::{
    NewLicence, NewPreprint, NewPreprintFile, NewPreprintVersion, NewSubject,
    NewSupplementaryFile, PreprintKey,
};
use ::entity::keyword::ActiveModel as KeywordActiveModel;
use ::entity::keyword::Entity as Keyword;
use ::entity::keyword::Model as KeywordModel;
use ::entity::licence::ActiveModel as LicenceActiveModel;
use ::entity::licence::Entity as Licence;
use ::entity::licence::Model as LicenceModel;
use ::entity::preprint::ActiveModel as PreprintActiveModel;
use ::entity::preprint::Entity as Preprint;
use ::entity::preprint::Model as PreprintModel;
use ::entity::preprint_file::ActiveModel as PreprintFileActiveModel;
use ::entity::preprint_file::Entity as PreprintFile;
use ::entity::preprint_file::Model as PreprintFileModel;
use ::entity::preprint_keyword::ActiveModel as PreprintKeywordActiveModel;
use ::entity::preprint_keyword::Entity as PreprintKeyword;
use ::entity::preprint_subject::ActiveModel as PreprintSubjectActiveModel;
use ::entity::preprint_subject::Entity as PreprintSubject;
use ::entity::preprint_supplementary_file::ActiveModel as SupplementaryFileActiveModel;
use ::entity::preprint_supplementary_file::Entity as SupplementaryFile;
use ::entity::preprint_supplementary_file::Model as SupplementaryFileModel;
use ::entity::preprint_version::ActiveModel as PreprintVersionActiveModel;
use ::entity::preprint_version::Entity as PreprintVersion;
use ::entity::preprint_version::Model as PreprintVersionModel;
use ::entity::repository_field_answer::ActiveModel as FieldAnswerActiveModel;
use ::entity::repository_field_answer::Entity as FieldAnswer;
use ::entity::repository_field_answer::Model as FieldAnswerModel;
use ::entity::subject::ActiveModel as SubjectActiveModel;
use ::entity::subject::Entity as Subject;
use ::entity::subject::Model as SubjectModel;
use ::entity::workflow_log::Entity as WorkflowLog;
use async_trait::async_trait;
use entity::{
    keyword, licence, preprint, preprint_file, preprint_subject,
    preprint_supplementary_file, preprint_version, repository_field_answer, subject, workflow_log,
};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

#[derive(Debug, Clone, Default)]
pub struct DBPreprintsRepo {
    pub db_session: DatabaseConnection,
}

#[async_trait]
pub trait PreprintsRepo: Send + Sync {
    /// Licences are unique per (press, name).
    async fn get_or_create_licence(&self, licence: NewLicence)
        -> Result<(LicenceModel, bool), DbErr>;

    /// Subjects are unique per (repository, name, parent).
    async fn get_or_create_subject(&self, subject: NewSubject)
        -> Result<(SubjectModel, bool), DbErr>;

    async fn find_subject(
        &self,
        repository_id: i32,
        name: &str,
        parent_id: Option<i32>,
    ) -> Result<Option<SubjectModel>, DbErr>;

    async fn get_or_create_keyword(&self, word: &str) -> Result<KeywordModel, DbErr>;

    async fn find_preprint(
        &self,
        repository_id: i32,
        key: &PreprintKey,
    ) -> Result<Option<PreprintModel>, DbErr>;

    async fn get_or_create_preprint(
        &self,
        key: PreprintKey,
        defaults: NewPreprint,
    ) -> Result<(PreprintModel, bool), DbErr>;

    async fn get_preprint(
        &self,
        repository_id: i32,
        preprint_id: i32,
    ) -> Result<Option<PreprintModel>, DbErr>;

    /// Writes every column of the model back.
    async fn update_preprint(&self, preprint: PreprintModel) -> Result<PreprintModel, DbErr>;

    /// Returns whether a new link was created.
    async fn link_subject(&self, preprint_id: i32, subject_id: i32) -> Result<bool, DbErr>;

    async fn link_keyword(&self, preprint_id: i32, keyword_id: i32) -> Result<bool, DbErr>;

    /// Subjects of a preprint, oldest first.
    async fn subjects_for(&self, preprint_id: i32) -> Result<Vec<SubjectModel>, DbErr>;

    /// Supplementary links are unique per (preprint, url).
    async fn get_or_create_supplementary_file(
        &self,
        file: NewSupplementaryFile,
    ) -> Result<(SupplementaryFileModel, bool), DbErr>;

    /// Answers are unique per (preprint, field).
    async fn get_or_create_field_answer(
        &self,
        preprint_id: i32,
        field_id: i32,
        answer: String,
    ) -> Result<(FieldAnswerModel, bool), DbErr>;

    async fn find_file_by_path(&self, path: &str) -> Result<Option<PreprintFileModel>, DbErr>;

    /// Files are unique per stored path.
    async fn get_or_create_file(
        &self,
        file: NewPreprintFile,
    ) -> Result<(PreprintFileModel, bool), DbErr>;

    async fn delete_file(&self, file_id: i32) -> Result<(), DbErr>;

    /// Versions are unique per (file, preprint).
    async fn get_or_create_version(
        &self,
        version: NewPreprintVersion,
    ) -> Result<(PreprintVersionModel, bool), DbErr>;

    /// Deletes the repository's preprints marked withdrawn, with their dependent rows.
    async fn delete_withdrawn(&self, repository_id: i32) -> Result<u64, DbErr>;

    /// Submitted preprints that have no workflow log entry.
    async fn list_missing_workflow_logs(&self) -> Result<Vec<PreprintModel>, DbErr>;
}

fn preprint_key_filter(key: &PreprintKey) -> sea_orm::sea_query::SimpleExpr {
    match key {
        PreprintKey::PreprintDoi(doi) => preprint::Column::PreprintDoi.eq(doi.as_str()),
        PreprintKey::SourceReference(reference) => {
            preprint::Column::SourceReference.eq(reference.as_str())
        }
    }
}

#[async_trait]
impl PreprintsRepo for DBPreprintsRepo {
    async fn get_or_create_licence(
        &self,
        new_licence: NewLicence,
    ) -> Result<(LicenceModel, bool), DbErr> {
        let existing = Licence::find()
            .filter(licence::Column::PressId.eq(new_licence.press_id))
            .filter(licence::Column::Name.eq(new_licence.name.as_str()))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        let licence = LicenceActiveModel {
            id: Default::default(),
            press_id: ActiveValue::Set(new_licence.press_id),
            name: ActiveValue::Set(new_licence.name),
            short_name: ActiveValue::Set(new_licence.short_name),
            url: ActiveValue::Set(new_licence.url),
            text: ActiveValue::Set(new_licence.text),
            order: ActiveValue::Set(new_licence.order),
        };
        Ok((licence.insert(&self.db_session).await?, true))
    }

    async fn get_or_create_subject(
        &self,
        new_subject: NewSubject,
    ) -> Result<(SubjectModel, bool), DbErr> {
        if let Some(existing) = self
            .find_subject(
                new_subject.repository_id,
                &new_subject.name,
                new_subject.parent_id,
            )
            .await?
        {
            return Ok((existing, false));
        }
        let subject = SubjectActiveModel {
            id: Default::default(),
            repository_id: ActiveValue::Set(new_subject.repository_id),
            slug: ActiveValue::Set(slugify(&new_subject.name)),
            name: ActiveValue::Set(new_subject.name),
            parent_id: ActiveValue::Set(new_subject.parent_id),
        };
        Ok((subject.insert(&self.db_session).await?, true))
    }

    async fn find_subject(
        &self,
        repository_id: i32,
        name: &str,
        parent_id: Option<i32>,
    ) -> Result<Option<SubjectModel>, DbErr> {
        let parent_filter = match parent_id {
            Some(parent_id) => subject::Column::ParentId.eq(parent_id),
            None => subject::Column::ParentId.is_null(),
        };
        Subject::find()
            .filter(subject::Column::RepositoryId.eq(repository_id))
            .filter(subject::Column::Name.eq(name))
            .filter(parent_filter)
            .one(&self.db_session)
            .await
    }

    async fn get_or_create_keyword(&self, word: &str) -> Result<KeywordModel, DbErr> {
        let existing = Keyword::find()
            .filter(keyword::Column::Word.eq(word))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let keyword = KeywordActiveModel {
            id: Default::default(),
            word: ActiveValue::Set(word.to_string()),
        };
        keyword.insert(&self.db_session).await
    }

    async fn find_preprint(
        &self,
        repository_id: i32,
        key: &PreprintKey,
    ) -> Result<Option<PreprintModel>, DbErr> {
        Preprint::find()
            .filter(preprint::Column::RepositoryId.eq(repository_id))
            .filter(preprint_key_filter(key))
            .one(&self.db_session)
            .await
    }

    async fn get_or_create_preprint(
        &self,
        key: PreprintKey,
        defaults: NewPreprint,
    ) -> Result<(PreprintModel, bool), DbErr> {
        if let Some(existing) = self.find_preprint(defaults.repository_id, &key).await? {
            return Ok((existing, false));
        }
        let (preprint_doi, source_reference) = match key {
            PreprintKey::PreprintDoi(doi) => (Some(doi), defaults.source_reference),
            PreprintKey::SourceReference(reference) => (defaults.preprint_doi, Some(reference)),
        };
        let preprint = PreprintActiveModel {
            id: Default::default(),
            repository_id: ActiveValue::Set(defaults.repository_id),
            owner_id: ActiveValue::Set(None),
            licence_id: ActiveValue::Set(defaults.licence_id),
            submission_file_id: ActiveValue::Set(None),
            title: ActiveValue::Set(defaults.title),
            abstract_text: ActiveValue::Set(defaults.abstract_text),
            stage: ActiveValue::Set(defaults.stage),
            current_step: ActiveValue::Set(defaults.current_step),
            comments_editor: ActiveValue::Set(defaults.comments_editor),
            preprint_decision_notification: ActiveValue::Set(
                defaults.preprint_decision_notification,
            ),
            doi: ActiveValue::Set(defaults.doi),
            preprint_doi: ActiveValue::Set(preprint_doi),
            source_reference: ActiveValue::Set(source_reference),
            date_started: ActiveValue::Set(defaults.date_started),
            date_submitted: ActiveValue::Set(defaults.date_submitted),
            date_accepted: ActiveValue::Set(defaults.date_accepted),
            date_published: ActiveValue::Set(defaults.date_published),
            date_updated: ActiveValue::Set(defaults.date_updated),
        };
        Ok((preprint.insert(&self.db_session).await?, true))
    }

    async fn get_preprint(
        &self,
        repository_id: i32,
        preprint_id: i32,
    ) -> Result<Option<PreprintModel>, DbErr> {
        Preprint::find_by_id(preprint_id)
            .filter(preprint::Column::RepositoryId.eq(repository_id))
            .one(&self.db_session)
            .await
    }

    async fn update_preprint(&self, preprint: PreprintModel) -> Result<PreprintModel, DbErr> {
        let active: PreprintActiveModel = preprint.into();
        active.reset_all().update(&self.db_session).await
    }

    async fn link_subject(&self, preprint_id: i32, subject_id: i32) -> Result<bool, DbErr> {
        let existing = PreprintSubject::find_by_id((preprint_id, subject_id))
            .one(&self.db_session)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }
        let link = PreprintSubjectActiveModel {
            preprint_id: ActiveValue::Set(preprint_id),
            subject_id: ActiveValue::Set(subject_id),
        };
        PreprintSubject::insert(link).exec(&self.db_session).await?;
        Ok(true)
    }

    async fn link_keyword(&self, preprint_id: i32, keyword_id: i32) -> Result<bool, DbErr> {
        let existing = PreprintKeyword::find_by_id((preprint_id, keyword_id))
            .one(&self.db_session)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }
        let link = PreprintKeywordActiveModel {
            preprint_id: ActiveValue::Set(preprint_id),
            keyword_id: ActiveValue::Set(keyword_id),
        };
        PreprintKeyword::insert(link).exec(&self.db_session).await?;
        Ok(true)
    }

    async fn subjects_for(&self, preprint_id: i32) -> Result<Vec<SubjectModel>, DbErr> {
        let subject_ids: Vec<i32> = PreprintSubject::find()
            .filter(preprint_subject::Column::PreprintId.eq(preprint_id))
            .all(&self.db_session)
            .await?
            .into_iter()
            .map(|link| link.subject_id)
            .collect();
        if subject_ids.is_empty() {
            return Ok(vec![]);
        }
        Subject::find()
            .filter(subject::Column::Id.is_in(subject_ids))
            .order_by_asc(subject::Column::Id)
            .all(&self.db_session)
            .await
    }

    async fn get_or_create_supplementary_file(
        &self,
        file: NewSupplementaryFile,
    ) -> Result<(SupplementaryFileModel, bool), DbErr> {
        let existing = SupplementaryFile::find()
            .filter(preprint_supplementary_file::Column::PreprintId.eq(file.preprint_id))
            .filter(preprint_supplementary_file::Column::Url.eq(file.url.as_str()))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        let supplementary = SupplementaryFileActiveModel {
            id: Default::default(),
            preprint_id: ActiveValue::Set(file.preprint_id),
            url: ActiveValue::Set(file.url),
            label: ActiveValue::Set(file.label),
            order: ActiveValue::Set(file.order),
        };
        Ok((supplementary.insert(&self.db_session).await?, true))
    }

    async fn get_or_create_field_answer(
        &self,
        preprint_id: i32,
        field_id: i32,
        answer: String,
    ) -> Result<(FieldAnswerModel, bool), DbErr> {
        let existing = FieldAnswer::find()
            .filter(repository_field_answer::Column::PreprintId.eq(preprint_id))
            .filter(repository_field_answer::Column::FieldId.eq(field_id))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        let field_answer = FieldAnswerActiveModel {
            id: Default::default(),
            field_id: ActiveValue::Set(field_id),
            preprint_id: ActiveValue::Set(preprint_id),
            answer: ActiveValue::Set(answer),
        };
        Ok((field_answer.insert(&self.db_session).await?, true))
    }

    async fn find_file_by_path(&self, path: &str) -> Result<Option<PreprintFileModel>, DbErr> {
        PreprintFile::find()
            .filter(preprint_file::Column::File.eq(path))
            .one(&self.db_session)
            .await
    }

    async fn get_or_create_file(
        &self,
        file: NewPreprintFile,
    ) -> Result<(PreprintFileModel, bool), DbErr> {
        if let Some(existing) = self.find_file_by_path(&file.file).await? {
            return Ok((existing, false));
        }
        let preprint_file = PreprintFileActiveModel {
            id: Default::default(),
            preprint_id: ActiveValue::Set(file.preprint_id),
            file: ActiveValue::Set(file.file),
            original_filename: ActiveValue::Set(file.original_filename),
            uploaded: ActiveValue::Set(file.uploaded),
            mime_type: ActiveValue::Set(file.mime_type),
            size: ActiveValue::Set(file.size),
        };
        Ok((preprint_file.insert(&self.db_session).await?, true))
    }

    async fn delete_file(&self, file_id: i32) -> Result<(), DbErr> {
        PreprintFile::delete_by_id(file_id)
            .exec(&self.db_session)
            .await?;
        Ok(())
    }

    async fn get_or_create_version(
        &self,
        version: NewPreprintVersion,
    ) -> Result<(PreprintVersionModel, bool), DbErr> {
        let existing = PreprintVersion::find()
            .filter(preprint_version::Column::FileId.eq(version.file_id))
            .filter(preprint_version::Column::PreprintId.eq(version.preprint_id))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        let preprint_version = PreprintVersionActiveModel {
            id: Default::default(),
            preprint_id: ActiveValue::Set(version.preprint_id),
            file_id: ActiveValue::Set(version.file_id),
            version: ActiveValue::Set(version.version),
            date_time: ActiveValue::Set(version.date_time),
        };
        Ok((preprint_version.insert(&self.db_session).await?, true))
    }

    async fn delete_withdrawn(&self, repository_id: i32) -> Result<u64, DbErr> {
        let result = Preprint::delete_many()
            .filter(preprint::Column::RepositoryId.eq(repository_id))
            .filter(preprint::Column::CommentsEditor.eq(WITHDRAWN_STATE))
            .exec(&self.db_session)
            .await?;
        Ok(result.rows_affected)
    }

    async fn list_missing_workflow_logs(&self) -> Result<Vec<PreprintModel>, DbErr> {
        Preprint::find()
            .filter(preprint::Column::DateSubmitted.is_not_null())
            .filter(
                preprint::Column::Id.not_in_subquery(
                    Query::select()
                        .column(workflow_log::Column::PreprintId)
                        .from(WorkflowLog)
                        .to_owned(),
                ),
            )
            .order_by_asc(preprint::Column::Id)
            .all(&self.db_session)
            .await
    }
}

//! Test utilities: in-memory repositories and fixtures.
//!
//! The in-memory repositories keep real state behind a mutex and honour the same
//! get-or-create rules as the database repositories, so idempotence can be asserted
//! without a database or network connection.

use crate::errors::{FetchError, RegistrationError};
use crate::models::common::{slugify, WITHDRAWN_STATE};
use crate::models::records::{NormalizedPreprint, RecordDates, SupplementaryLink};
use crate::models::request::{
    FieldDefinition, NewAccount, NewAuthor, NewLicence, NewPreprint, NewPreprintAuthor,
    NewPreprintFile, NewPreprintVersion, NewSubject, NewSupplementaryFile, PreprintKey,
};
use crate::models::response::{MergedLinks, MoveSummary};
use crate::repos::ezid_repo::EzidRepo;
use crate::config::EzidConfig;
use crate::repos::files_repo::FilesRepo;
use crate::repos::journals_repo::JournalsRepo;
use crate::repos::osf_repo::{SourcePage, SourceRepo};
use crate::repos::people_repo::{AuthorEntry, PeopleRepo};
use crate::repos::preprints_repo::PreprintsRepo;
use crate::repos::repositories_repo::RepositoriesRepo;
use crate::services::osf_import_service::{OsfImportService, DEFAULT_MAX_PAGE_ATTEMPTS};
use crate::services::upsert_service::{UpsertService, PUBLISHED_STAGE, PUBLISHED_STEP};
use ::entity::account::Model as AccountModel;
use ::entity::article::Model as ArticleModel;
use ::entity::article_author::Model as ArticleAuthorModel;
use ::entity::author::Model as AuthorModel;
use ::entity::journal::Model as JournalModel;
use ::entity::keyword::Model as KeywordModel;
use ::entity::licence::Model as LicenceModel;
use ::entity::preprint::Model as PreprintModel;
use ::entity::preprint_author::Model as PreprintAuthorModel;
use ::entity::preprint_file::Model as PreprintFileModel;
use ::entity::preprint_keyword::Model as PreprintKeywordModel;
use ::entity::preprint_subject::Model as PreprintSubjectModel;
use ::entity::preprint_supplementary_file::Model as SupplementaryFileModel;
use ::entity::preprint_version::Model as PreprintVersionModel;
use ::entity::repo_ezid_settings::Model as RepoEzidSettingsModel;
use ::entity::repository::Model as RepositoryModel;
use ::entity::repository_field::Model as RepositoryFieldModel;
use ::entity::repository_field_answer::Model as FieldAnswerModel;
use ::entity::subject::Model as SubjectModel;
use ::entity::workflow_log::Model as WorkflowLogModel;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::StatusCode;
use sea_orm::DbErr;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

fn next_id<T>(rows: &[T], id: impl Fn(&T) -> i32) -> i32 {
    rows.iter().map(id).max().unwrap_or(0) + 1
}

#[derive(Debug, Default)]
struct StoreState {
    repositories: Vec<RepositoryModel>,
    fields: Vec<RepositoryFieldModel>,
    ezid_settings: Vec<RepoEzidSettingsModel>,
    licences: Vec<LicenceModel>,
    subjects: Vec<SubjectModel>,
    keywords: Vec<KeywordModel>,
    preprints: Vec<PreprintModel>,
    preprint_subjects: Vec<PreprintSubjectModel>,
    preprint_keywords: Vec<PreprintKeywordModel>,
    supplementary_files: Vec<SupplementaryFileModel>,
    field_answers: Vec<FieldAnswerModel>,
    files: Vec<PreprintFileModel>,
    versions: Vec<PreprintVersionModel>,
    authors: Vec<AuthorModel>,
    accounts: Vec<AccountModel>,
    preprint_authors: Vec<PreprintAuthorModel>,
    workflow_logs: Vec<WorkflowLogModel>,
    journals: Vec<JournalModel>,
    articles: Vec<ArticleModel>,
    article_authors: Vec<ArticleAuthorModel>,
}

impl StoreState {
    /// Removes a preprint and the rows the foreign keys cascade to.
    fn delete_preprint(&mut self, preprint_id: i32) {
        self.preprints.retain(|preprint| preprint.id != preprint_id);
        self.preprint_subjects
            .retain(|link| link.preprint_id != preprint_id);
        self.preprint_keywords
            .retain(|link| link.preprint_id != preprint_id);
        self.supplementary_files
            .retain(|file| file.preprint_id != preprint_id);
        self.field_answers
            .retain(|answer| answer.preprint_id != preprint_id);
        self.files.retain(|file| file.preprint_id != preprint_id);
        self.versions
            .retain(|version| version.preprint_id != preprint_id);
        self.preprint_authors
            .retain(|link| link.preprint_id != preprint_id);
        self.workflow_logs.retain(|log| log.preprint_id != preprint_id);
    }
}

/// Number of rows per table, for asserting that a re-run wrote nothing new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCounts {
    pub licences: usize,
    pub subjects: usize,
    pub keywords: usize,
    pub preprints: usize,
    pub files: usize,
    pub versions: usize,
    pub authors: usize,
    pub accounts: usize,
    pub preprint_authors: usize,
    pub supplementary_files: usize,
    pub field_answers: usize,
}

/// In-memory implementation of RepositoriesRepo, PreprintsRepo and PeopleRepo.
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    pub files: InMemoryFilesRepo,
}

impl InMemoryStore {
    /// A store holding one repository: id 1, press 1, `EarthArXiv` / `eartharxiv`.
    pub fn with_repository() -> Self {
        let store = InMemoryStore::default();
        store.lock().repositories.push(RepositoryModel {
            id: 1,
            press_id: 1,
            name: "EarthArXiv".to_string(),
            short_name: "eartharxiv".to_string(),
        });
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn insert_licence(&self, press_id: i32, name: &str) -> i32 {
        let mut state = self.lock();
        let id = next_id(&state.licences, |licence| licence.id);
        state.licences.push(LicenceModel {
            id,
            press_id,
            name: name.to_string(),
            short_name: name.to_string(),
            url: String::new(),
            text: String::new(),
            order: id,
        });
        id
    }

    pub fn insert_subject(&self, name: &str, parent_id: Option<i32>) -> i32 {
        let mut state = self.lock();
        let id = next_id(&state.subjects, |subject| subject.id);
        state.subjects.push(SubjectModel {
            id,
            repository_id: 1,
            name: name.to_string(),
            slug: slugify(name),
            parent_id,
        });
        id
    }

    /// Inserts the preprint, replacing any row with the same id.
    pub fn insert_preprint(&self, preprint: PreprintModel) {
        let mut state = self.lock();
        state.preprints.retain(|existing| existing.id != preprint.id);
        state.preprints.push(preprint);
        state.preprints.sort_by_key(|preprint| preprint.id);
    }

    pub fn insert_preprint_subject(&self, preprint_id: i32, subject_id: i32) {
        self.lock().preprint_subjects.push(PreprintSubjectModel {
            preprint_id,
            subject_id,
        });
    }

    pub fn insert_ezid_settings(&self, repository_id: i32, shoulder: &str, owner: &str) {
        let mut state = self.lock();
        let id = next_id(&state.ezid_settings, |settings| settings.id);
        state.ezid_settings.push(RepoEzidSettingsModel {
            id,
            repository_id,
            ezid_shoulder: shoulder.to_string(),
            ezid_owner: owner.to_string(),
            ezid_username: None,
            ezid_password: None,
            ezid_endpoint_url: None,
        });
    }

    /// Stores EZID credentials on the repository's existing settings row.
    pub fn set_ezid_credentials(&self, repository_id: i32, credentials: &EzidConfig) {
        let mut state = self.lock();
        for settings in state
            .ezid_settings
            .iter_mut()
            .filter(|settings| settings.repository_id == repository_id)
        {
            settings.ezid_username = Some(credentials.username.clone());
            settings.ezid_password = Some(credentials.password.clone());
            settings.ezid_endpoint_url = Some(credentials.endpoint_url.clone());
        }
    }

    pub fn insert_journal(&self, code: &str, crossref_registrant: Option<&str>) -> i32 {
        let mut state = self.lock();
        let id = next_id(&state.journals, |journal| journal.id);
        state.journals.push(JournalModel {
            id,
            code: code.to_string(),
            name: format!("Journal of {code}"),
            issn: Some("2816-9387".to_string()),
            crossref_registrant: crossref_registrant.map(str::to_string),
        });
        id
    }

    /// Inserts the article, replacing any row with the same id.
    pub fn insert_article(&self, article: ArticleModel) {
        let mut state = self.lock();
        state.articles.retain(|existing| existing.id != article.id);
        state.articles.push(article);
    }

    pub fn insert_article_author(&self, article_id: i32, author_id: i32, order: i32) {
        let mut state = self.lock();
        let id = next_id(&state.article_authors, |link| link.id);
        state.article_authors.push(ArticleAuthorModel {
            id,
            article_id,
            author_id,
            order,
        });
    }

    pub fn insert_workflow_log(&self, preprint_id: i32) {
        let mut state = self.lock();
        let id = next_id(&state.workflow_logs, |log| log.id);
        state.workflow_logs.push(WorkflowLogModel {
            id,
            preprint_id,
            element_name: "review".to_string(),
            timestamp: Utc::now().naive_utc(),
        });
    }

    pub fn preprint(&self, id: i32) -> Option<PreprintModel> {
        self.lock()
            .preprints
            .iter()
            .find(|preprint| preprint.id == id)
            .cloned()
    }

    pub fn preprints(&self) -> Vec<PreprintModel> {
        self.lock().preprints.clone()
    }

    pub fn licences(&self) -> Vec<LicenceModel> {
        self.lock().licences.clone()
    }

    pub fn subjects(&self) -> Vec<SubjectModel> {
        self.lock().subjects.clone()
    }

    pub fn subjects_of(&self, preprint_id: i32) -> Vec<SubjectModel> {
        let state = self.lock();
        let ids: HashSet<i32> = state
            .preprint_subjects
            .iter()
            .filter(|link| link.preprint_id == preprint_id)
            .map(|link| link.subject_id)
            .collect();
        state
            .subjects
            .iter()
            .filter(|subject| ids.contains(&subject.id))
            .cloned()
            .collect()
    }

    pub fn keywords(&self) -> Vec<KeywordModel> {
        self.lock().keywords.clone()
    }

    pub fn files(&self) -> Vec<PreprintFileModel> {
        self.lock().files.clone()
    }

    pub fn versions(&self) -> Vec<PreprintVersionModel> {
        self.lock().versions.clone()
    }

    pub fn authors(&self) -> Vec<AuthorModel> {
        self.lock().authors.clone()
    }

    pub fn accounts(&self) -> Vec<AccountModel> {
        self.lock().accounts.clone()
    }

    pub fn preprint_authors(&self) -> Vec<PreprintAuthorModel> {
        self.lock().preprint_authors.clone()
    }

    pub fn supplementary_files(&self) -> Vec<SupplementaryFileModel> {
        self.lock().supplementary_files.clone()
    }

    pub fn field_answers(&self) -> Vec<FieldAnswerModel> {
        self.lock().field_answers.clone()
    }

    pub fn row_counts(&self) -> RowCounts {
        let state = self.lock();
        RowCounts {
            licences: state.licences.len(),
            subjects: state.subjects.len(),
            keywords: state.keywords.len(),
            preprints: state.preprints.len(),
            files: state.files.len(),
            versions: state.versions.len(),
            authors: state.authors.len(),
            accounts: state.accounts.len(),
            preprint_authors: state.preprint_authors.len(),
            supplementary_files: state.supplementary_files.len(),
            field_answers: state.field_answers.len(),
        }
    }
}

#[async_trait]
impl RepositoriesRepo for InMemoryStore {
    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryModel>, DbErr> {
        Ok(self
            .lock()
            .repositories
            .iter()
            .find(|repository| repository.name == name)
            .cloned())
    }

    async fn get_by_short_name(&self, short_name: &str) -> Result<Option<RepositoryModel>, DbErr> {
        Ok(self
            .lock()
            .repositories
            .iter()
            .find(|repository| repository.short_name == short_name)
            .cloned())
    }

    async fn get_or_create_field(
        &self,
        repository_id: i32,
        definition: FieldDefinition,
    ) -> Result<RepositoryFieldModel, DbErr> {
        let mut state = self.lock();
        if let Some(field) = state
            .fields
            .iter()
            .find(|field| field.repository_id == repository_id && field.name == definition.name)
        {
            return Ok(field.clone());
        }
        let field = RepositoryFieldModel {
            id: next_id(&state.fields, |field| field.id),
            repository_id,
            name: definition.name.to_string(),
            input_type: "text".to_string(),
            required: false,
            order: definition.order,
            display: false,
        };
        state.fields.push(field.clone());
        Ok(field)
    }

    async fn get_licence_by_name(
        &self,
        press_id: i32,
        name: &str,
    ) -> Result<Option<LicenceModel>, DbErr> {
        Ok(self
            .lock()
            .licences
            .iter()
            .find(|licence| licence.press_id == press_id && licence.name == name)
            .cloned())
    }

    async fn get_ezid_settings(
        &self,
        repository_id: i32,
    ) -> Result<Option<RepoEzidSettingsModel>, DbErr> {
        Ok(self
            .lock()
            .ezid_settings
            .iter()
            .find(|settings| settings.repository_id == repository_id)
            .cloned())
    }
}

fn key_matches(preprint: &PreprintModel, key: &PreprintKey) -> bool {
    match key {
        PreprintKey::PreprintDoi(doi) => preprint.preprint_doi.as_deref() == Some(doi.as_str()),
        PreprintKey::SourceReference(reference) => {
            preprint.source_reference.as_deref() == Some(reference.as_str())
        }
    }
}

#[async_trait]
impl PreprintsRepo for InMemoryStore {
    async fn get_or_create_licence(
        &self,
        licence: NewLicence,
    ) -> Result<(LicenceModel, bool), DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state
            .licences
            .iter()
            .find(|existing| existing.press_id == licence.press_id && existing.name == licence.name)
        {
            return Ok((existing.clone(), false));
        }
        let created = LicenceModel {
            id: next_id(&state.licences, |licence| licence.id),
            press_id: licence.press_id,
            name: licence.name,
            short_name: licence.short_name,
            url: licence.url,
            text: licence.text,
            order: licence.order,
        };
        state.licences.push(created.clone());
        Ok((created, true))
    }

    async fn get_or_create_subject(
        &self,
        subject: NewSubject,
    ) -> Result<(SubjectModel, bool), DbErr> {
        if let Some(existing) = self
            .find_subject(subject.repository_id, &subject.name, subject.parent_id)
            .await?
        {
            return Ok((existing, false));
        }
        let mut state = self.lock();
        let created = SubjectModel {
            id: next_id(&state.subjects, |subject| subject.id),
            repository_id: subject.repository_id,
            slug: slugify(&subject.name),
            name: subject.name,
            parent_id: subject.parent_id,
        };
        state.subjects.push(created.clone());
        Ok((created, true))
    }

    async fn find_subject(
        &self,
        repository_id: i32,
        name: &str,
        parent_id: Option<i32>,
    ) -> Result<Option<SubjectModel>, DbErr> {
        Ok(self
            .lock()
            .subjects
            .iter()
            .find(|subject| {
                subject.repository_id == repository_id
                    && subject.name == name
                    && subject.parent_id == parent_id
            })
            .cloned())
    }

    async fn get_or_create_keyword(&self, word: &str) -> Result<KeywordModel, DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state.keywords.iter().find(|keyword| keyword.word == word) {
            return Ok(existing.clone());
        }
        let created = KeywordModel {
            id: next_id(&state.keywords, |keyword| keyword.id),
            word: word.to_string(),
        };
        state.keywords.push(created.clone());
        Ok(created)
    }

    async fn find_preprint(
        &self,
        repository_id: i32,
        key: &PreprintKey,
    ) -> Result<Option<PreprintModel>, DbErr> {
        Ok(self
            .lock()
            .preprints
            .iter()
            .find(|preprint| preprint.repository_id == repository_id && key_matches(preprint, key))
            .cloned())
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
        let mut state = self.lock();
        let created = PreprintModel {
            id: next_id(&state.preprints, |preprint| preprint.id),
            repository_id: defaults.repository_id,
            owner_id: None,
            licence_id: defaults.licence_id,
            submission_file_id: None,
            title: defaults.title,
            abstract_text: defaults.abstract_text,
            stage: defaults.stage,
            current_step: defaults.current_step,
            comments_editor: defaults.comments_editor,
            preprint_decision_notification: defaults.preprint_decision_notification,
            doi: defaults.doi,
            preprint_doi,
            source_reference,
            date_started: defaults.date_started,
            date_submitted: defaults.date_submitted,
            date_accepted: defaults.date_accepted,
            date_published: defaults.date_published,
            date_updated: defaults.date_updated,
        };
        state.preprints.push(created.clone());
        Ok((created, true))
    }

    async fn get_preprint(
        &self,
        repository_id: i32,
        preprint_id: i32,
    ) -> Result<Option<PreprintModel>, DbErr> {
        Ok(self
            .preprint(preprint_id)
            .filter(|preprint| preprint.repository_id == repository_id))
    }

    async fn update_preprint(&self, preprint: PreprintModel) -> Result<PreprintModel, DbErr> {
        let mut state = self.lock();
        let Some(existing) = state
            .preprints
            .iter_mut()
            .find(|existing| existing.id == preprint.id)
        else {
            return Err(DbErr::RecordNotFound(format!("preprint {}", preprint.id)));
        };
        *existing = preprint.clone();
        Ok(preprint)
    }

    async fn link_subject(&self, preprint_id: i32, subject_id: i32) -> Result<bool, DbErr> {
        let mut state = self.lock();
        let link = PreprintSubjectModel {
            preprint_id,
            subject_id,
        };
        if state.preprint_subjects.contains(&link) {
            return Ok(false);
        }
        state.preprint_subjects.push(link);
        Ok(true)
    }

    async fn link_keyword(&self, preprint_id: i32, keyword_id: i32) -> Result<bool, DbErr> {
        let mut state = self.lock();
        let link = PreprintKeywordModel {
            preprint_id,
            keyword_id,
        };
        if state.preprint_keywords.contains(&link) {
            return Ok(false);
        }
        state.preprint_keywords.push(link);
        Ok(true)
    }

    async fn subjects_for(&self, preprint_id: i32) -> Result<Vec<SubjectModel>, DbErr> {
        Ok(self.subjects_of(preprint_id))
    }

    async fn get_or_create_supplementary_file(
        &self,
        file: NewSupplementaryFile,
    ) -> Result<(SupplementaryFileModel, bool), DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state
            .supplementary_files
            .iter()
            .find(|existing| existing.preprint_id == file.preprint_id && existing.url == file.url)
        {
            return Ok((existing.clone(), false));
        }
        let created = SupplementaryFileModel {
            id: next_id(&state.supplementary_files, |file| file.id),
            preprint_id: file.preprint_id,
            url: file.url,
            label: file.label,
            order: file.order,
        };
        state.supplementary_files.push(created.clone());
        Ok((created, true))
    }

    async fn get_or_create_field_answer(
        &self,
        preprint_id: i32,
        field_id: i32,
        answer: String,
    ) -> Result<(FieldAnswerModel, bool), DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state
            .field_answers
            .iter()
            .find(|existing| existing.preprint_id == preprint_id && existing.field_id == field_id)
        {
            return Ok((existing.clone(), false));
        }
        let created = FieldAnswerModel {
            id: next_id(&state.field_answers, |answer| answer.id),
            field_id,
            preprint_id,
            answer,
        };
        state.field_answers.push(created.clone());
        Ok((created, true))
    }

    async fn find_file_by_path(&self, path: &str) -> Result<Option<PreprintFileModel>, DbErr> {
        Ok(self
            .lock()
            .files
            .iter()
            .find(|file| file.file == path)
            .cloned())
    }

    async fn get_or_create_file(
        &self,
        file: NewPreprintFile,
    ) -> Result<(PreprintFileModel, bool), DbErr> {
        if let Some(existing) = self.find_file_by_path(&file.file).await? {
            return Ok((existing, false));
        }
        let mut state = self.lock();
        let created = PreprintFileModel {
            id: next_id(&state.files, |file| file.id),
            preprint_id: file.preprint_id,
            file: file.file,
            original_filename: file.original_filename,
            uploaded: file.uploaded,
            mime_type: file.mime_type,
            size: file.size,
        };
        state.files.push(created.clone());
        Ok((created, true))
    }

    async fn delete_file(&self, file_id: i32) -> Result<(), DbErr> {
        let mut state = self.lock();
        state.files.retain(|file| file.id != file_id);
        state.versions.retain(|version| version.file_id != file_id);
        Ok(())
    }

    async fn get_or_create_version(
        &self,
        version: NewPreprintVersion,
    ) -> Result<(PreprintVersionModel, bool), DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state.versions.iter().find(|existing| {
            existing.file_id == version.file_id && existing.preprint_id == version.preprint_id
        }) {
            return Ok((existing.clone(), false));
        }
        let created = PreprintVersionModel {
            id: next_id(&state.versions, |version| version.id),
            preprint_id: version.preprint_id,
            file_id: version.file_id,
            version: version.version,
            date_time: version.date_time,
        };
        state.versions.push(created.clone());
        Ok((created, true))
    }

    async fn delete_withdrawn(&self, repository_id: i32) -> Result<u64, DbErr> {
        let mut state = self.lock();
        let withdrawn: Vec<i32> = state
            .preprints
            .iter()
            .filter(|preprint| {
                preprint.repository_id == repository_id
                    && preprint.comments_editor.as_deref() == Some(WITHDRAWN_STATE)
            })
            .map(|preprint| preprint.id)
            .collect();
        for preprint_id in &withdrawn {
            state.delete_preprint(*preprint_id);
        }
        Ok(withdrawn.len() as u64)
    }

    async fn list_missing_workflow_logs(&self) -> Result<Vec<PreprintModel>, DbErr> {
        let state = self.lock();
        let logged: HashSet<i32> = state.workflow_logs.iter().map(|log| log.preprint_id).collect();
        Ok(state
            .preprints
            .iter()
            .filter(|preprint| preprint.date_submitted.is_some() && !logged.contains(&preprint.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PeopleRepo for InMemoryStore {
    async fn get_or_create_author(&self, author: NewAuthor) -> Result<(AuthorModel, bool), DbErr> {
        if let Some(existing) = self.get_author_by_email(&author.email_address).await? {
            return Ok((existing, false));
        }
        let mut state = self.lock();
        let created = AuthorModel {
            id: next_id(&state.authors, |author| author.id),
            email_address: author.email_address,
            first_name: author.first_name,
            middle_name: author.middle_name,
            last_name: author.last_name,
            orcid: author.orcid,
            affiliation: author.affiliation,
        };
        state.authors.push(created.clone());
        Ok((created, true))
    }

    async fn get_or_create_account(
        &self,
        account: NewAccount,
    ) -> Result<(AccountModel, bool), DbErr> {
        if let Some(existing) = self.get_account_by_email(&account.email).await? {
            return Ok((existing, false));
        }
        let mut state = self.lock();
        let created = AccountModel {
            id: next_id(&state.accounts, |account| account.id),
            username: account.email.to_lowercase(),
            email: account.email,
            password: account.password_hash,
            first_name: account.first_name,
            middle_name: account.middle_name,
            last_name: account.last_name,
            orcid: account.orcid,
            institution: account.institution,
            is_active: account.is_active,
            date_joined: Utc::now().naive_utc(),
            uuid: Uuid::new_v4(),
        };
        state.accounts.push(created.clone());
        Ok((created, true))
    }

    async fn get_or_create_preprint_author(
        &self,
        link: NewPreprintAuthor,
    ) -> Result<(PreprintAuthorModel, bool), DbErr> {
        let mut state = self.lock();
        if let Some(existing) = state.preprint_authors.iter().find(|existing| {
            existing.preprint_id == link.preprint_id && existing.author_id == link.author_id
        }) {
            return Ok((existing.clone(), false));
        }
        let created = PreprintAuthorModel {
            id: next_id(&state.preprint_authors, |link| link.id),
            preprint_id: link.preprint_id,
            author_id: link.author_id,
            account_id: link.account_id,
            order: link.order,
            affiliation: link.affiliation,
        };
        state.preprint_authors.push(created.clone());
        Ok((created, true))
    }

    async fn authors_for(&self, preprint_id: i32) -> Result<Vec<AuthorEntry>, DbErr> {
        let state = self.lock();
        let mut links: Vec<PreprintAuthorModel> = state
            .preprint_authors
            .iter()
            .filter(|link| link.preprint_id == preprint_id)
            .cloned()
            .collect();
        links.sort_by_key(|link| link.order);
        Ok(links
            .into_iter()
            .filter_map(|link| {
                let author = state.authors.iter().find(|a| a.id == link.author_id)?.clone();
                let account = link
                    .account_id
                    .and_then(|id| state.accounts.iter().find(|a| a.id == id).cloned());
                Some((link, author, account))
            })
            .collect())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountModel>, DbErr> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn get_author_by_email(&self, email: &str) -> Result<Option<AuthorModel>, DbErr> {
        Ok(self
            .lock()
            .authors
            .iter()
            .find(|author| author.email_address == email)
            .cloned())
    }

    async fn transfer_account(
        &self,
        from_account_id: i32,
        to_account_id: i32,
    ) -> Result<MoveSummary, DbErr> {
        let mut state = self.lock();
        let mut summary = MoveSummary {
            owned_preprints: 0,
            author_links: 0,
        };
        for preprint in state
            .preprints
            .iter_mut()
            .filter(|preprint| preprint.owner_id == Some(from_account_id))
        {
            preprint.owner_id = Some(to_account_id);
            summary.owned_preprints += 1;
        }
        for link in state
            .preprint_authors
            .iter_mut()
            .filter(|link| link.account_id == Some(from_account_id))
        {
            link.account_id = Some(to_account_id);
            summary.author_links += 1;
        }
        state.accounts.retain(|account| account.id != from_account_id);
        Ok(summary)
    }

    async fn rename_author_email(&self, author_id: i32, email: &str) -> Result<AuthorModel, DbErr> {
        let mut state = self.lock();
        let author = state
            .authors
            .iter_mut()
            .find(|author| author.id == author_id)
            .ok_or_else(|| DbErr::RecordNotFound(format!("author {author_id}")))?;
        author.email_address = email.to_string();
        Ok(author.clone())
    }

    async fn merge_authors(
        &self,
        kept: AuthorModel,
        removed_id: i32,
    ) -> Result<MergedLinks, DbErr> {
        let mut state = self.lock();
        let kept_id = kept.id;
        if let Some(existing) = state.authors.iter_mut().find(|author| author.id == kept_id) {
            *existing = kept;
        }
        let already_linked: HashSet<i32> = state
            .preprint_authors
            .iter()
            .filter(|link| link.author_id == kept_id)
            .map(|link| link.preprint_id)
            .collect();
        let before = state.preprint_authors.len();
        state
            .preprint_authors
            .retain(|link| !(link.author_id == removed_id && already_linked.contains(&link.preprint_id)));
        let mut links = MergedLinks {
            moved: 0,
            dropped_duplicates: (before - state.preprint_authors.len()) as u64,
        };
        for link in state
            .preprint_authors
            .iter_mut()
            .filter(|link| link.author_id == removed_id)
        {
            link.author_id = kept_id;
            links.moved += 1;
        }
        state.authors.retain(|author| author.id != removed_id);
        Ok(links)
    }

    async fn accounts_sharing_last_name(&self) -> Result<Vec<AccountModel>, DbErr> {
        let state = self.lock();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for account in state.accounts.iter().filter(|account| account.is_active) {
            if let Some(last_name) = account.last_name.as_deref() {
                *counts.entry(last_name).or_default() += 1;
            }
        }
        let mut shared: Vec<AccountModel> = state
            .accounts
            .iter()
            .filter(|account| account.is_active)
            .filter(|account| {
                account
                    .last_name
                    .as_deref()
                    .is_some_and(|last_name| counts.get(last_name).copied().unwrap_or(0) > 1)
            })
            .cloned()
            .collect();
        shared.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(shared)
    }
}

#[async_trait]
impl JournalsRepo for InMemoryStore {
    async fn get_article(&self, article_id: i32) -> Result<Option<ArticleModel>, DbErr> {
        let state = self.lock();
        Ok(state
            .articles
            .iter()
            .find(|article| article.id == article_id)
            .cloned())
    }

    async fn get_journal(&self, journal_id: i32) -> Result<Option<JournalModel>, DbErr> {
        let state = self.lock();
        Ok(state
            .journals
            .iter()
            .find(|journal| journal.id == journal_id)
            .cloned())
    }

    async fn authors_for_article(&self, article_id: i32) -> Result<Vec<AuthorModel>, DbErr> {
        let state = self.lock();
        let mut links: Vec<&ArticleAuthorModel> = state
            .article_authors
            .iter()
            .filter(|link| link.article_id == article_id)
            .collect();
        links.sort_by_key(|link| link.order);
        Ok(links
            .into_iter()
            .filter_map(|link| {
                state
                    .authors
                    .iter()
                    .find(|author| author.id == link.author_id)
                    .cloned()
            })
            .collect())
    }
}

/// In-memory implementation of FilesRepo keyed by relative path.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFilesRepo {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_next_write: Arc<AtomicBool>,
}

impl InMemoryFilesRepo {
    /// The next write fails with an I/O error.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, relative_path: &str, contents: Bytes) {
        self.files
            .lock()
            .unwrap()
            .insert(relative_path.to_string(), contents);
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files.lock().unwrap().contains_key(relative_path)
    }

    pub fn get(&self, relative_path: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(relative_path).cloned()
    }
}

#[async_trait]
impl FilesRepo for InMemoryFilesRepo {
    async fn write_atomic(&self, relative_path: &str, contents: Bytes) -> Result<u64, io::Error> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("no space left on device"));
        }
        let size = contents.len() as u64;
        self.insert(relative_path, contents);
        Ok(size)
    }

    async fn exists(&self, relative_path: &str) -> bool {
        self.contains(relative_path)
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, io::Error> {
        Ok(self.files.lock().unwrap().remove(relative_path).is_some())
    }
}

#[derive(Debug, Default)]
struct SourceState {
    pages: HashMap<String, SourcePage>,
    documents: HashMap<String, Value>,
    downloads: HashMap<String, Bytes>,
    transient_failures: HashMap<String, u32>,
    denied: HashSet<String>,
    requests: Vec<String>,
}

/// In-memory implementation of SourceRepo serving registered pages, documents and files.
/// Unknown URLs answer 404. Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct InMemorySourceRepo {
    state: Arc<Mutex<SourceState>>,
}

impl InMemorySourceRepo {
    pub fn insert_page(&mut self, url: &str, items: Vec<Value>, next_cursor: Option<String>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), SourcePage { items, next_cursor });
    }

    pub fn insert_document(&mut self, url: &str, document: Value) {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert(url.to_string(), document);
    }

    pub fn insert_download(&mut self, url: &str, contents: Bytes) {
        self.state
            .lock()
            .unwrap()
            .downloads
            .insert(url.to_string(), contents);
    }

    pub fn remove_download(&self, url: &str) {
        self.state.lock().unwrap().downloads.remove(url);
    }

    /// The next `times` requests for the page fail with a transient error.
    pub fn fail_page(&self, url: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(url.to_string(), times);
    }

    /// Requests for the URL answer 401.
    pub fn deny(&self, url: &str) {
        self.state.lock().unwrap().denied.insert(url.to_string());
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|requested| *requested == url)
            .count()
    }

    fn answer<T: Clone>(
        &self,
        url: &str,
        lookup: impl Fn(&SourceState) -> Option<T>,
    ) -> Result<T, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(url.to_string());
        if state.denied.contains(url) {
            return Err(FetchError::Fatal {
                url: url.to_string(),
                status: StatusCode::UNAUTHORIZED,
            });
        }
        if let Some(remaining) = state.transient_failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason: "HTTP 503 Service Unavailable".to_string(),
                });
            }
        }
        lookup(&state).ok_or_else(|| FetchError::Fatal {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND,
        })
    }
}

#[async_trait]
impl SourceRepo for InMemorySourceRepo {
    async fn fetch_page(&self, cursor: &str) -> Result<SourcePage, FetchError> {
        self.answer(cursor, |state| state.pages.get(cursor).cloned())
    }

    async fn fetch_by_url(&self, url: &str) -> Result<Value, FetchError> {
        self.answer(url, |state| state.documents.get(url).cloned())
    }

    async fn download(&self, url: &str) -> Result<Bytes, FetchError> {
        self.answer(url, |state| state.downloads.get(url).cloned())
    }
}

/// One request received by [`InMemoryEzidRepo`].
#[derive(Clone, Debug, PartialEq)]
pub struct EzidRequest {
    pub operation: &'static str,
    pub username: String,
    pub identifier: String,
    pub payload: String,
}

/// In-memory implementation of EzidRepo that records requests and answers with a fixed body.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEzidRepo {
    body: String,
    requests: Arc<Mutex<Vec<EzidRequest>>>,
}

impl InMemoryEzidRepo {
    pub fn answering(body: &str) -> Self {
        InMemoryEzidRepo {
            body: body.to_string(),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<EzidRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(
        &self,
        operation: &'static str,
        credentials: &EzidConfig,
        identifier: &str,
        payload: String,
    ) -> Result<String, RegistrationError> {
        self.requests.lock().unwrap().push(EzidRequest {
            operation,
            username: credentials.username.clone(),
            identifier: identifier.to_string(),
            payload,
        });
        Ok(self.body.clone())
    }
}

#[async_trait]
impl EzidRepo for InMemoryEzidRepo {
    async fn mint(
        &self,
        credentials: &EzidConfig,
        shoulder: &str,
        payload: String,
    ) -> Result<String, RegistrationError> {
        self.record("mint", credentials, shoulder, payload)
    }

    async fn update(
        &self,
        credentials: &EzidConfig,
        identifier: &str,
        payload: String,
    ) -> Result<String, RegistrationError> {
        self.record("update", credentials, identifier, payload)
    }

    async fn create(
        &self,
        credentials: &EzidConfig,
        identifier: &str,
        payload: String,
    ) -> Result<String, RegistrationError> {
        self.record("create", credentials, identifier, payload)
    }
}

/// Builds an upsert service over the store and its files repo.
pub fn build_test_upsert_service(store: &InMemoryStore) -> UpsertService {
    UpsertService {
        preprints_repo: Arc::new(store.clone()),
        people_repo: Arc::new(store.clone()),
        files_repo: Arc::new(store.files.clone()),
    }
}

/// Builds an OSF import service that retries without waiting.
pub fn build_test_osf_import_service(
    store: &InMemoryStore,
    source: InMemorySourceRepo,
) -> OsfImportService {
    OsfImportService {
        source_repo: Arc::new(source),
        repositories_repo: Arc::new(store.clone()),
        upsert_service: build_test_upsert_service(store),
        max_page_attempts: DEFAULT_MAX_PAGE_ATTEMPTS,
        retry_backoff: Duration::ZERO,
    }
}

fn mock_date(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

pub fn mock_normalized_preprint() -> NormalizedPreprint {
    NormalizedPreprint {
        source_id: "abc12".to_string(),
        working_identifier: "10.31223/osf.io/abc12".to_string(),
        review_state: "accepted".to_string(),
        title: "Mantle plumes revisited".to_string(),
        abstract_text: "An abstract".to_string(),
        dates: RecordDates {
            created: mock_date(1),
            modified: mock_date(3),
            published: mock_date(2),
            doi_created: mock_date(2),
        },
        published_doi: None,
        licence_url: None,
        contributors_url: None,
        files_url: None,
        subject_branches: vec![],
        tags: vec!["basalt".to_string()],
        supplementary_links: vec![SupplementaryLink {
            url: "https://osf.io/xyz98".to_string(),
            label: "Supplementary material".to_string(),
            order: 1,
        }],
        conflict_of_interest: None,
        why_no_data: None,
    }
}

/// A raw OSF preprint whose relationship links point at `https://api.test/preprints/{id}/...`.
pub fn mock_osf_record(id: &str, reviews_state: &str, licence_url: &str) -> Value {
    let base = format!("https://api.test/preprints/{id}");
    json!({
        "id": id,
        "type": "preprints",
        "attributes": {
            "title": format!("Preprint {id}"),
            "description": "An abstract",
            "date_created": "2021-01-02T03:04:05.678901",
            "date_modified": "2021-02-02T03:04:05",
            "date_published": "2021-01-05T00:00:00",
            "preprint_doi_created": null,
            "reviews_state": reviews_state,
            "doi": null,
            "data_links": [],
            "why_no_data": "Not applicable",
            "conflict_of_interest_statement": "None declared",
            "subjects": [],
            "tags": ["basalt"]
        },
        "relationships": {
            "license": {"links": {"related": {"href": licence_url}}},
            "contributors": {"links": {"related": {"href": format!("{base}/contributors/")}}},
            "files": {"links": {"related": {"href": format!("{base}/files/")}}},
            "node": {"data": null}
        },
        "links": {"preprint_doi": format!("https://doi.org/10.31223/osf.io/{id}")}
    })
}

/// A published preprint in repository 1 without a DOI.
pub fn mock_published_preprint(id: i32) -> PreprintModel {
    PreprintModel {
        id,
        repository_id: 1,
        owner_id: None,
        licence_id: None,
        submission_file_id: Some(1),
        title: "Isotopes at 100% depth".to_string(),
        abstract_text: "Deep isotopes.".to_string(),
        stage: PUBLISHED_STAGE.to_string(),
        current_step: PUBLISHED_STEP,
        comments_editor: None,
        preprint_decision_notification: true,
        doi: Some("https://doi.org/10.1000/journal.123".to_string()),
        preprint_doi: None,
        source_reference: None,
        date_started: Some(mock_date(1)),
        date_submitted: Some(mock_date(1)),
        date_accepted: Some(mock_date(2)),
        date_published: Some(mock_date(2)),
        date_updated: Some(mock_date(3)),
    }
}

pub const PLOS_GO_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ingest type="eartharxiv">
  <metadata-filename name="PONE-D-21-00001.xml"/>
  <pdf-filename name="PONE-D-21-00001.pdf"/>
  <vendor-id>plos</vendor-id>
  <reference-id>PONE-D-21-00001</reference-id>
</ingest>"#;

pub const PLOS_JATS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<article>
  <front>
    <journal-meta>
      <journal-id journal-id-type="delivering-vendor-id">plos</journal-id>
      <journal-id journal-id-type="delivering-publisher-id">PLOS</journal-id>
      <journal-id journal-id-type="destination-journal-code">eartharxiv</journal-id>
      <journal-id journal-id-type="delivering-journal-code">PONE</journal-id>
    </journal-meta>
    <article-meta>
      <article-categories>
        <subj-group>
          <subject>Earth Science : Geochemistry</subject>
          <subject>Physics</subject>
        </subj-group>
      </article-categories>
      <title-group>
        <article-title>Isotopes  of the deep</article-title>
      </title-group>
      <contrib-group>
        <contrib contrib-type="author" corresp="yes">
          <name name-style="western"><surname>Curie</surname><given-names>Marie</given-names></name>
          <address><email>marie@example.org</email><institution>Sorbonne</institution></address>
          <contrib-id contrib-id-type="orcid">0000-0001-8549-9354</contrib-id>
        </contrib>
        <contrib contrib-type="author">
          <collab>The Deep Earth Consortium</collab>
        </contrib>
        <contrib contrib-type="author">
          <name name-style="western"><surname>Franklin</surname><given-names>Rosalind</given-names></name>
          <address><email>rosalind@example.org</email></address>
        </contrib>
      </contrib-group>
      <abstract><p>Deep isotopes.</p></abstract>
      <kwd-group><kwd>isotopes, mantle</kwd><kwd>basalt</kwd></kwd-group>
      <permissions><license><license-p>cc_by</license-p></license></permissions>
      <custom-meta-group>
        <custom-meta><meta-name>author_approval</meta-name><meta-value>true</meta-value></custom-meta>
        <custom-meta><meta-name>coi_stmt</meta-name><meta-value>None</meta-value></custom-meta>
        <custom-meta><meta-name>data_availability</meta-name><meta-value>In the paper</meta-value></custom-meta>
        <custom-meta><meta-name>data_availability_link</meta-name><meta-value>https://data.example.org/x</meta-value></custom-meta>
      </custom-meta-group>
    </article-meta>
  </front>
</article>"#;


//! Upsert engine: turns normalized records into rows through get-or-create calls.
//!
//! The first run that stores a value wins. Later runs only add associations and rows that
//! are still missing. Ordering matters: the licence is resolved before the preprint is
//! created, and the preprint exists before anything is attached to it.

use crate::auth::generate_password_hash;
use crate::errors::ImportError;
use crate::models::common::WITHDRAWN_STATE;
use crate::models::records::{
    NormalizedAuthor, NormalizedLicence, NormalizedPreprint, NormalizedVersion, SupplementaryLink,
};
use crate::models::request::{
    NewAccount, NewAuthor, NewLicence, NewPreprint, NewPreprintAuthor, NewPreprintFile,
    NewPreprintVersion, NewSubject, NewSupplementaryFile, PreprintKey,
};
use crate::repos::files_repo::FilesRepo;
use crate::repos::osf_repo::SourceRepo;
use crate::repos::people_repo::PeopleRepo;
use crate::repos::preprints_repo::PreprintsRepo;
use ::entity::licence::Model as LicenceModel;
use ::entity::preprint::Model as PreprintModel;
use ::entity::preprint_file::Model as PreprintFileModel;
use bytes::Bytes;
use chrono::Utc;
use sea_orm::DbErr;
use std::sync::Arc;
use tracing::{info, warn};

pub const PUBLISHED_STAGE: &str = "preprint_published";
pub const PUBLISHED_STEP: i32 = 5;
/// Workflow step a preprint falls back to when it has no manuscript file.
pub const INITIAL_STEP: i32 = 1;

/// Result of storing the file versions of one preprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredFiles {
    pub stored: usize,
    pub submission_file_id: Option<i32>,
}

pub fn file_path(preprint_id: i32, file_name: &str) -> String {
    format!("repos/{preprint_id}/{file_name}")
}

#[derive(Clone)]
pub struct UpsertService {
    pub preprints_repo: Arc<dyn PreprintsRepo>,
    pub people_repo: Arc<dyn PeopleRepo>,
    pub files_repo: Arc<dyn FilesRepo>,
}

impl UpsertService {
    pub async fn upsert_licence(
        &self,
        press_id: i32,
        licence: &NormalizedLicence,
        order: i32,
    ) -> Result<(LicenceModel, bool), DbErr> {
        self.preprints_repo
            .get_or_create_licence(NewLicence {
                press_id,
                name: licence.name.clone(),
                short_name: licence.name.clone(),
                url: licence.url.clone(),
                text: licence.text.clone(),
                order,
            })
            .await
    }

    /// Flags an already imported preprint for the withdrawal cleanup. Returns whether one existed.
    pub async fn mark_withdrawn(
        &self,
        repository_id: i32,
        record: &NormalizedPreprint,
    ) -> Result<bool, DbErr> {
        let key = PreprintKey::PreprintDoi(record.working_identifier.clone());
        let Some(mut preprint) = self.preprints_repo.find_preprint(repository_id, &key).await?
        else {
            return Ok(false);
        };
        if preprint.comments_editor.as_deref() != Some(WITHDRAWN_STATE) {
            preprint.comments_editor = Some(WITHDRAWN_STATE.to_string());
            self.preprints_repo.update_preprint(preprint).await?;
        }
        Ok(true)
    }

    /// Gets or creates the preprint for an OSF record. Only empty columns of an existing
    /// preprint are filled in.
    pub async fn upsert_article(
        &self,
        repository_id: i32,
        record: &NormalizedPreprint,
        licence_id: Option<i32>,
    ) -> Result<(PreprintModel, bool), DbErr> {
        let dates = &record.dates;
        let defaults = NewPreprint {
            repository_id,
            licence_id,
            title: record.title.clone(),
            abstract_text: record.abstract_text.clone(),
            stage: PUBLISHED_STAGE.to_string(),
            current_step: PUBLISHED_STEP,
            comments_editor: Some(record.review_state.clone()),
            preprint_decision_notification: true,
            doi: record.published_doi.clone(),
            preprint_doi: None,
            source_reference: None,
            date_started: Some(dates.created),
            date_submitted: Some(dates.created),
            date_accepted: Some(dates.published),
            date_published: Some(dates.published),
            date_updated: Some(dates.modified),
        };
        let key = PreprintKey::PreprintDoi(record.working_identifier.clone());
        let (preprint, created) = self
            .preprints_repo
            .get_or_create_preprint(key, defaults)
            .await?;
        if created {
            return Ok((preprint, true));
        }
        let mut filled = preprint.clone();
        if filled.licence_id.is_none() {
            filled.licence_id = licence_id;
        }
        if filled.doi.is_none() {
            filled.doi = record.published_doi.clone();
        }
        if filled == preprint {
            return Ok((preprint, false));
        }
        Ok((self.preprints_repo.update_preprint(filled).await?, false))
    }

    /// Resolves each branch left to right, chaining every segment under the previous one.
    /// Returns the ids of the subjects linked to the preprint.
    pub async fn attach_subjects(
        &self,
        repository_id: i32,
        preprint_id: i32,
        branches: &[Vec<String>],
    ) -> Result<Vec<i32>, DbErr> {
        let mut linked = Vec::new();
        for branch in branches {
            let mut parent_id = None;
            for name in branch {
                let (subject, _) = self
                    .preprints_repo
                    .get_or_create_subject(NewSubject {
                        repository_id,
                        name: name.clone(),
                        parent_id,
                    })
                    .await?;
                self.preprints_repo
                    .link_subject(preprint_id, subject.id)
                    .await?;
                if !linked.contains(&subject.id) {
                    linked.push(subject.id);
                }
                parent_id = Some(subject.id);
            }
        }
        Ok(linked)
    }

    pub async fn attach_keywords(&self, preprint_id: i32, words: &[String]) -> Result<usize, DbErr> {
        let mut added = 0;
        for word in words {
            let keyword = self.preprints_repo.get_or_create_keyword(word).await?;
            if self
                .preprints_repo
                .link_keyword(preprint_id, keyword.id)
                .await?
            {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Creates authors, their accounts and the preprint links.
    ///
    /// Accounts are created for active authors, or for every author when
    /// `always_create_account` is set (the account is then left inactive). Returns the
    /// account that should own the preprint: the corresponding author's, otherwise the
    /// first one created or found.
    pub async fn attach_authors(
        &self,
        preprint_id: i32,
        authors: &[NormalizedAuthor],
        always_create_account: bool,
    ) -> Result<Option<i32>, DbErr> {
        let mut first_account = None;
        let mut corresponding_account = None;
        for normalized in authors {
            let (author, _) = self
                .people_repo
                .get_or_create_author(NewAuthor {
                    email_address: normalized.email.clone(),
                    first_name: normalized.first_name.clone(),
                    middle_name: normalized.middle_name.clone(),
                    last_name: normalized.last_name.clone(),
                    orcid: normalized.orcid.clone(),
                    affiliation: normalized.affiliation.clone(),
                })
                .await?;
            let account_id = if normalized.active || always_create_account {
                let (account, created) = self
                    .people_repo
                    .get_or_create_account(NewAccount {
                        email: normalized.email.clone(),
                        password_hash: generate_password_hash(),
                        first_name: normalized.first_name.clone(),
                        middle_name: normalized.middle_name.clone(),
                        last_name: normalized.last_name.clone(),
                        orcid: normalized.orcid.clone(),
                        institution: normalized.affiliation.clone().unwrap_or_default(),
                        is_active: normalized.active,
                    })
                    .await?;
                if created {
                    info!(email = normalized.email, "Created account");
                }
                Some(account.id)
            } else {
                None
            };
            self.people_repo
                .get_or_create_preprint_author(NewPreprintAuthor {
                    preprint_id,
                    author_id: author.id,
                    account_id,
                    order: normalized.order,
                    affiliation: normalized.affiliation.clone(),
                })
                .await?;
            if first_account.is_none() {
                first_account = account_id;
            }
            if normalized.corresponding && corresponding_account.is_none() {
                corresponding_account = account_id;
            }
        }
        Ok(corresponding_account.or(first_account))
    }

    pub async fn attach_supplementary(
        &self,
        preprint_id: i32,
        links: &[SupplementaryLink],
    ) -> Result<usize, DbErr> {
        let mut added = 0;
        for link in links {
            let (_, created) = self
                .preprints_repo
                .get_or_create_supplementary_file(NewSupplementaryFile {
                    preprint_id,
                    url: link.url.clone(),
                    label: link.label.clone(),
                    order: link.order,
                })
                .await?;
            if created {
                added += 1;
            }
        }
        Ok(added)
    }

    /// `answers` pairs a field id with its answer text.
    pub async fn attach_field_answers(
        &self,
        preprint_id: i32,
        answers: Vec<(i32, String)>,
    ) -> Result<usize, DbErr> {
        let mut added = 0;
        for (field_id, answer) in answers {
            let (_, created) = self
                .preprints_repo
                .get_or_create_field_answer(preprint_id, field_id, answer)
                .await?;
            if created {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Downloads and records every version. An older version that cannot be downloaded is
    /// skipped, but a failed download of the current version fails the whole record so the
    /// stored submission file is left alone until a later run. The current version becomes
    /// the submission file; when none is marked current the first stored version is used.
    pub async fn store_versions(
        &self,
        preprint_id: i32,
        versions: &[NormalizedVersion],
        source: &dyn SourceRepo,
    ) -> Result<StoredFiles, ImportError> {
        let mut result = StoredFiles::default();
        let mut first_file_id = None;
        for version in versions {
            let path = file_path(preprint_id, &version.stored_filename);
            let existing = self.preprints_repo.find_file_by_path(&path).await?;
            let file = match existing {
                Some(file) if self.files_repo.exists(&path).await => file,
                _ => {
                    let contents = match source.download(&version.download_url).await {
                        Ok(contents) => contents,
                        Err(err) if version.is_current => {
                            warn!(%err, preprint_id, version = version.version_id, "Could not download current file version");
                            return Err(err.into());
                        }
                        Err(err) => {
                            warn!(%err, preprint_id, version = version.version_id, "Could not download file version");
                            continue;
                        }
                    };
                    let size = self.files_repo.write_atomic(&path, contents).await?;
                    let (file, _) = self
                        .preprints_repo
                        .get_or_create_file(NewPreprintFile {
                            preprint_id,
                            file: path.clone(),
                            original_filename: version.original_filename.clone(),
                            mime_type: version.mime_type.clone(),
                            size: i64::try_from(size).unwrap_or(version.size),
                            uploaded: version.created,
                        })
                        .await?;
                    file
                }
            };
            self.preprints_repo
                .get_or_create_version(NewPreprintVersion {
                    preprint_id,
                    file_id: file.id,
                    version: version.version_id.clone(),
                    date_time: version.created,
                })
                .await?;
            result.stored += 1;
            first_file_id.get_or_insert(file.id);
            if version.is_current {
                result.submission_file_id = Some(file.id);
            }
            self.remove_legacy_file(preprint_id, &version.legacy_filename)
                .await?;
        }
        if result.submission_file_id.is_none() {
            result.submission_file_id = first_file_id;
        }
        Ok(result)
    }

    /// Removes the unversioned file an earlier importer release wrote for the same upload.
    async fn remove_legacy_file(
        &self,
        preprint_id: i32,
        legacy_filename: &str,
    ) -> Result<(), ImportError> {
        let legacy_path = file_path(preprint_id, legacy_filename);
        if let Some(legacy) = self.preprints_repo.find_file_by_path(&legacy_path).await? {
            info!(preprint_id, path = legacy_path, "Removing legacy unversioned file");
            self.preprints_repo.delete_file(legacy.id).await?;
        }
        self.files_repo.remove(&legacy_path).await?;
        Ok(())
    }

    /// Stores a manuscript delivered with the submission (no source versions).
    pub async fn store_submission_file(
        &self,
        preprint_id: i32,
        file_name: &str,
        mime_type: &str,
        contents: Bytes,
    ) -> Result<PreprintFileModel, ImportError> {
        let path = file_path(preprint_id, file_name);
        if let Some(existing) = self.preprints_repo.find_file_by_path(&path).await? {
            return Ok(existing);
        }
        let size = self.files_repo.write_atomic(&path, contents).await?;
        let (file, _) = self
            .preprints_repo
            .get_or_create_file(NewPreprintFile {
                preprint_id,
                file: path,
                original_filename: file_name.to_string(),
                mime_type: mime_type.to_string(),
                size: i64::try_from(size).unwrap_or_default(),
                uploaded: Utc::now().naive_utc(),
            })
            .await?;
        Ok(file)
    }

    /// Links the submission file and owner. A preprint left without any file goes back to
    /// the first workflow step with its acceptance and publication dates cleared.
    pub async fn finalize_article(
        &self,
        preprint: PreprintModel,
        submission_file_id: Option<i32>,
        owner_id: Option<i32>,
    ) -> Result<PreprintModel, DbErr> {
        let mut finalized = preprint.clone();
        if submission_file_id.is_some() {
            finalized.submission_file_id = submission_file_id;
        }
        if finalized.owner_id.is_none() {
            finalized.owner_id = owner_id;
        }
        if finalized.submission_file_id.is_none() {
            finalized.current_step = INITIAL_STEP;
            finalized.date_accepted = None;
            finalized.date_published = None;
        }
        if finalized == preprint {
            return Ok(preprint);
        }
        self.preprints_repo.update_preprint(finalized).await
    }

    pub async fn delete_withdrawn(&self, repository_id: i32) -> Result<u64, DbErr> {
        let deleted = self.preprints_repo.delete_withdrawn(repository_id).await?;
        if deleted > 0 {
            info!(repository_id, deleted, "Deleted withdrawn preprints");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_tools::{build_test_upsert_service, mock_normalized_preprint, InMemoryStore};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_shared_prefix_creates_one_parent() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let branches = vec![
            vec!["Earth Science".to_string(), "Geochemistry".to_string()],
            vec!["Earth Science".to_string(), "Geology".to_string()],
        ];

        let linked = upsert.attach_subjects(1, 10, &branches).await.unwrap();

        let subjects = store.subjects();
        assert_eq!(subjects.len(), 3);
        assert_eq!(linked.len(), 3);
        let parent = subjects
            .iter()
            .find(|subject| subject.name == "Earth Science")
            .unwrap();
        assert_eq!(parent.parent_id, None);
        for child in subjects.iter().filter(|subject| subject.name != "Earth Science") {
            assert_eq!(child.parent_id, Some(parent.id));
        }
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents_is_two_subjects() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let branches = vec![
            vec!["Physics".to_string(), "Methods".to_string()],
            vec!["Chemistry".to_string(), "Methods".to_string()],
        ];

        upsert.attach_subjects(1, 10, &branches).await.unwrap();

        assert_eq!(store.subjects().len(), 4);
    }

    #[tokio::test]
    async fn test_upsert_article_never_overwrites() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let record = mock_normalized_preprint();
        let (first, created) = upsert.upsert_article(1, &record, Some(3)).await.unwrap();
        assert!(created);

        let mut changed = record.clone();
        changed.title = "A new title".to_string();
        let (second, created) = upsert.upsert_article(1, &changed, Some(4)).await.unwrap();

        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, record.title);
        assert_eq!(second.licence_id, Some(3));
        assert_eq!(store.preprints().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_resets_workflow_step() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let (preprint, _) = upsert
            .upsert_article(1, &mock_normalized_preprint(), None)
            .await
            .unwrap();
        assert_eq!(preprint.current_step, PUBLISHED_STEP);

        let finalized = upsert.finalize_article(preprint, None, None).await.unwrap();

        assert_eq!(finalized.current_step, INITIAL_STEP);
        assert_eq!(finalized.date_accepted, None);
        assert_eq!(finalized.date_published, None);
        assert_eq!(finalized.owner_id, None);
    }

    #[tokio::test]
    async fn test_only_active_authors_get_accounts() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let authors = vec![
            NormalizedAuthor {
                email: "inactive@eartharxiv.org".to_string(),
                order: 0,
                active: false,
                ..Default::default()
            },
            NormalizedAuthor {
                email: "active@eartharxiv.org".to_string(),
                order: 1,
                active: true,
                ..Default::default()
            },
        ];

        let owner = upsert.attach_authors(10, &authors, false).await.unwrap();

        let accounts = store.accounts();
        assert_eq!(store.authors().len(), 2);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].email, "active@eartharxiv.org");
        assert_eq!(owner, Some(accounts[0].id));
    }

    #[tokio::test]
    async fn test_corresponding_author_owns_submission() {
        let store = InMemoryStore::with_repository();
        let upsert = build_test_upsert_service(&store);
        let authors = vec![
            NormalizedAuthor {
                email: "first@example.org".to_string(),
                order: 1,
                ..Default::default()
            },
            NormalizedAuthor {
                email: "corresponding@example.org".to_string(),
                order: 2,
                corresponding: true,
                ..Default::default()
            },
        ];

        let owner = upsert.attach_authors(10, &authors, true).await.unwrap();

        let accounts = store.accounts();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().all(|account| !account.is_active));
        let corresponding = accounts
            .iter()
            .find(|account| account.email == "corresponding@example.org")
            .unwrap();
        assert_eq!(owner, Some(corresponding.id));
    }
}

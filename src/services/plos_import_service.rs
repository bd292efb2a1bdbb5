//! Import of PLOS submission packages delivered as XML feed files.
//!
//! A package is a `.go.xml` manifest, a JATS metadata file and the manuscript PDF, all
//! named after the PLOS reference id. Packages are staged from the drop directory into
//! the working directory, imported one by one, and then moved to the done or error
//! directory. A failing package never stops the others.

use crate::config::PlosConfig;
use crate::errors::{ImportError, PreconditionError, RecordNormalizationError};
use crate::models::records::{NormalizedSubmission, SupplementaryLink};
use crate::models::request::{FieldDefinition, NewPreprint, PreprintKey};
use crate::models::response::{ImportSummary, RecordOutcome};
use crate::normalizer::osf::PUBLIC_DATA_LABEL;
use crate::normalizer::plos::{parse_go_file, parse_submission, Manifest};
use crate::repos::repositories_repo::RepositoriesRepo;
use crate::repos::submissions_repo::SubmissionSourceRepo;
use crate::services::upsert_service::{UpsertService, PUBLISHED_STEP};
use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

pub const REVIEW_STAGE: &str = "preprint_review";
pub const GO_FILE_SUFFIX: &str = ".go.xml";

pub const COI_STATEMENT_FIELD: FieldDefinition = FieldDefinition {
    name: "Conflict of interest statement",
    order: 1,
};
pub const DATA_AVAILABILITY_FIELD: FieldDefinition = FieldDefinition {
    name: "Data Availability (Reason not available)",
    order: 2,
};

pub fn submission_comment(submission: &NormalizedSubmission) -> String {
    format!(
        "This is a PLOS->EarthArXiv submission: {}; {}",
        submission.reference_id, submission.journal_code
    )
}

struct PlosRun {
    repository_id: i32,
    licence_id: i32,
    coi_field_id: i32,
    data_availability_field_id: i32,
}

#[derive(Clone)]
pub struct PlosImportService {
    pub submissions_repo: Arc<dyn SubmissionSourceRepo>,
    pub repositories_repo: Arc<dyn RepositoriesRepo>,
    pub upsert_service: UpsertService,
    pub config: PlosConfig,
}

impl PlosImportService {
    pub async fn run(&self) -> Result<ImportSummary, ImportError> {
        let run = self.start_run().await?;
        let staged = self.stage().await?;
        info!(staged, "Staged PLOS feed files");

        let mut summary = ImportSummary::default();
        for go_name in self.go_files().await? {
            let mut package = vec![go_name.clone()];
            let target = match self.import_package(&run, &go_name, &mut package).await {
                Ok(outcome) => {
                    summary.record(outcome);
                    &self.config.done_dir
                }
                Err(err) => {
                    error!(package = go_name, %err, "Failed to import PLOS package");
                    summary.failed += 1;
                    &self.config.error_dir
                }
            };
            self.move_files(&package, target).await;
        }
        info!(summary = %summary, "PLOS import finished");
        Ok(summary)
    }

    async fn start_run(&self) -> Result<PlosRun, ImportError> {
        let name = &self.config.repository_name;
        let repository = self
            .repositories_repo
            .get_by_name(name)
            .await?
            .ok_or_else(|| PreconditionError::RepositoryNotFound(name.clone()))?;
        let licence = self
            .repositories_repo
            .get_licence_by_name(repository.press_id, &self.config.licence_name)
            .await?
            .ok_or_else(|| PreconditionError::LicenceNotFound(self.config.licence_name.clone()))?;
        let coi = self
            .repositories_repo
            .get_or_create_field(repository.id, COI_STATEMENT_FIELD)
            .await?;
        let data_availability = self
            .repositories_repo
            .get_or_create_field(repository.id, DATA_AVAILABILITY_FIELD)
            .await?;
        Ok(PlosRun {
            repository_id: repository.id,
            licence_id: licence.id,
            coi_field_id: coi.id,
            data_availability_field_id: data_availability.id,
        })
    }

    /// Copies every delivered file into the working directory and removes it from the drop.
    async fn stage(&self) -> Result<usize, ImportError> {
        fs::create_dir_all(&self.config.working_dir).await?;
        let names = self.submissions_repo.list().await?;
        for name in &names {
            let contents = self.submissions_repo.retrieve(name).await?;
            fs::write(self.config.working_dir.join(name), &contents).await?;
            self.submissions_repo.delete(name).await?;
        }
        Ok(names.len())
    }

    async fn go_files(&self) -> Result<Vec<String>, ImportError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.config.working_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(GO_FILE_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_working_file(&self, name: &str) -> Result<Bytes, ImportError> {
        Ok(Bytes::from(fs::read(self.config.working_dir.join(name)).await?))
    }

    async fn read_xml(&self, name: &str) -> Result<String, ImportError> {
        let bytes = self.read_working_file(name).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| RecordNormalizationError::new(name, format!("not UTF-8: {err}")).into())
    }

    /// Imports one package. `package` collects the file names that belong to it.
    async fn import_package(
        &self,
        run: &PlosRun,
        go_name: &str,
        package: &mut Vec<String>,
    ) -> Result<RecordOutcome, ImportError> {
        let manifest: Manifest = parse_go_file(go_name, &self.read_xml(go_name).await?)?;
        package.push(manifest.metadata_filename.clone());
        package.push(manifest.pdf_filename.clone());
        let submission =
            parse_submission(&manifest, &self.read_xml(&manifest.metadata_filename).await?)?;

        let preprints_repo = &self.upsert_service.preprints_repo;
        let key = PreprintKey::SourceReference(submission.reference_id.clone());
        // The submission file is linked last, so a preprint without one is an earlier
        // import that failed partway and is completed below.
        if let Some(existing) = preprints_repo.find_preprint(run.repository_id, &key).await? {
            if existing.submission_file_id.is_some() {
                info!(reference_id = submission.reference_id, "Submission already imported");
                return Ok(RecordOutcome::Skipped);
            }
            warn!(
                reference_id = submission.reference_id,
                preprint_id = existing.id,
                "Completing partially imported submission"
            );
        }
        let subject_ids = self.resolve_subjects(run.repository_id, &submission).await?;
        let pdf = self.read_working_file(&submission.pdf_filename).await?;

        let now = Utc::now().naive_utc();
        let (preprint, created) = preprints_repo
            .get_or_create_preprint(
                key,
                NewPreprint {
                    repository_id: run.repository_id,
                    licence_id: Some(run.licence_id),
                    title: submission.title.clone(),
                    abstract_text: submission.abstract_text.clone(),
                    stage: REVIEW_STAGE.to_string(),
                    current_step: PUBLISHED_STEP,
                    comments_editor: Some(submission_comment(&submission)),
                    preprint_decision_notification: false,
                    doi: None,
                    preprint_doi: None,
                    source_reference: None,
                    date_started: Some(now),
                    date_submitted: Some(now),
                    date_accepted: None,
                    date_published: None,
                    date_updated: Some(now),
                },
            )
            .await?;

        let upsert = &self.upsert_service;
        let file = upsert
            .store_submission_file(preprint.id, &submission.pdf_filename, "application/pdf", pdf)
            .await?;
        for subject_id in subject_ids {
            preprints_repo.link_subject(preprint.id, subject_id).await?;
        }
        upsert.attach_keywords(preprint.id, &submission.keywords).await?;
        let owner_id = upsert
            .attach_authors(preprint.id, &submission.authors, true)
            .await?;

        let mut answers = Vec::new();
        if let Some(statement) = &submission.conflict_of_interest {
            answers.push((run.coi_field_id, statement.clone()));
        }
        if let Some(reason) = &submission.data_availability {
            answers.push((run.data_availability_field_id, reason.clone()));
        }
        upsert.attach_field_answers(preprint.id, answers).await?;
        let links: Vec<SupplementaryLink> = submission
            .data_links
            .iter()
            .zip(1..)
            .map(|(url, order)| SupplementaryLink {
                url: url.clone(),
                label: PUBLIC_DATA_LABEL.to_string(),
                order,
            })
            .collect();
        upsert.attach_supplementary(preprint.id, &links).await?;

        upsert
            .finalize_article(preprint, Some(file.id), owner_id)
            .await?;
        info!(reference_id = submission.reference_id, created, "Imported PLOS submission");
        Ok(if created {
            RecordOutcome::Created
        } else {
            RecordOutcome::Updated
        })
    }

    /// Subjects are never created by this import: each must already exist in the taxonomy.
    async fn resolve_subjects(
        &self,
        repository_id: i32,
        submission: &NormalizedSubmission,
    ) -> Result<Vec<i32>, ImportError> {
        let preprints_repo = &self.upsert_service.preprints_repo;
        let unknown = |name: &str| {
            RecordNormalizationError::new(&submission.reference_id, format!("unknown subject {name}"))
        };
        let mut ids = Vec::new();
        for path in &submission.subjects {
            let parent = preprints_repo
                .find_subject(repository_id, &path.parent, None)
                .await?
                .ok_or_else(|| unknown(&path.parent))?;
            let subject = match &path.child {
                Some(child) => preprints_repo
                    .find_subject(repository_id, child, Some(parent.id))
                    .await?
                    .ok_or_else(|| unknown(child))?,
                None => parent,
            };
            ids.push(subject.id);
        }
        Ok(ids)
    }

    async fn move_files(&self, names: &[String], target: &Path) {
        if let Err(err) = fs::create_dir_all(target).await {
            warn!(%err, target = %target.display(), "Could not create target directory");
            return;
        }
        for name in names {
            let from = self.config.working_dir.join(name);
            if !fs::try_exists(&from).await.unwrap_or(false) {
                continue;
            }
            if let Err(err) = fs::rename(&from, target.join(name)).await {
                warn!(%err, file = name, "Could not move package file");
            }
        }
    }
}

//! Batch orchestrator for OSF preprint imports.
//!
//! A run walks the provider's preprint collection page by page. Each record is normalized,
//! its licence, contributors and files are expanded through follow-up requests, and the
//! result is handed to the [`UpsertService`]. A record that fails is logged with its source
//! id and counted; the run moves on. Only setup failures, rejected credentials and pages
//! that keep failing after the retries abort the run.

use crate::errors::{FetchError, ImportError, PreconditionError};
use crate::models::records::{NormalizedPreprint, NormalizedVersion};
use crate::models::request::FieldDefinition;
use crate::models::response::{ImportSummary, RecordOutcome};
use crate::normalizer::osf::{
    normalize_contributors, normalize_licence, normalize_preprint, normalize_storage_file,
    normalize_versions, source_id_of, storage_listing_url,
};
use crate::repos::osf_repo::{SourcePage, SourceRepo};
use crate::repos::repositories_repo::RepositoriesRepo;
use crate::services::upsert_service::UpsertService;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const CONFLICT_OF_INTEREST_FIELD: FieldDefinition = FieldDefinition {
    name: "conflict_of_interest_statement",
    order: 1,
};
pub const WHY_NO_DATA_FIELD: FieldDefinition = FieldDefinition {
    name: "why_no_data",
    order: 2,
};
pub const NUM_DOWNLOADS_FIELD: FieldDefinition = FieldDefinition {
    name: "num_downloads",
    order: 3,
};

pub const DEFAULT_MAX_PAGE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OsfImportRequest {
    pub repository_name: String,
    pub start_url: String,
    /// Domain of the synthesized `{osfUserId}@{domain}` author emails.
    pub email_domain: String,
}

/// State that lives for exactly one run.
#[derive(Debug)]
struct RunContext {
    repository_id: i32,
    press_id: i32,
    email_domain: String,
    conflict_of_interest_field_id: i32,
    why_no_data_field_id: i32,
    num_downloads_field_id: i32,
    /// Source licence URL to the persisted licence, `None` when the document was empty.
    licence_cache: HashMap<String, Option<i32>>,
    licence_order: i32,
    summary: ImportSummary,
}

#[derive(Clone)]
pub struct OsfImportService {
    pub source_repo: Arc<dyn SourceRepo>,
    pub repositories_repo: Arc<dyn RepositoriesRepo>,
    pub upsert_service: UpsertService,
    pub max_page_attempts: u32,
    pub retry_backoff: Duration,
}

impl OsfImportService {
    /// Imports every preprint reachable from `request.start_url`.
    ///
    /// # Arguments
    /// * `request` - Repository to import into, collection URL and author email domain
    ///
    /// # Returns
    /// The per-run summary, or the error that aborted the run
    pub async fn run(&self, request: OsfImportRequest) -> Result<ImportSummary, ImportError> {
        let mut ctx = self.start_run(&request).await?;
        let mut cursor = Some(request.start_url.clone());
        while let Some(url) = cursor {
            let page = self.fetch_page_with_retry(&url).await?;
            info!(url, records = page.items.len(), "Fetched page");
            for raw in page.items {
                let source_id = source_id_of(&raw);
                match self.process_record(&mut ctx, raw).await {
                    Ok(outcome) => ctx.summary.record(outcome),
                    Err(ImportError::Fetch(err)) if err.is_auth_failure() => {
                        error!(source_id, %err, "Source rejected credentials, aborting run");
                        return Err(err.into());
                    }
                    Err(err) => {
                        error!(source_id, %err, "Failed to import record");
                        ctx.summary.failed += 1;
                    }
                }
            }
            cursor = page.next_cursor;
        }
        ctx.summary.withdrawn_deleted = self
            .upsert_service
            .delete_withdrawn(ctx.repository_id)
            .await?;
        info!(
            repository = request.repository_name,
            summary = %ctx.summary,
            "OSF import finished"
        );
        Ok(ctx.summary)
    }

    /// Resolves the repository and provisions its custom fields before any record is read.
    async fn start_run(&self, request: &OsfImportRequest) -> Result<RunContext, ImportError> {
        let repository = self
            .repositories_repo
            .get_by_name(&request.repository_name)
            .await?
            .ok_or_else(|| PreconditionError::RepositoryNotFound(request.repository_name.clone()))?;
        let conflict_of_interest = self
            .repositories_repo
            .get_or_create_field(repository.id, CONFLICT_OF_INTEREST_FIELD)
            .await?;
        let why_no_data = self
            .repositories_repo
            .get_or_create_field(repository.id, WHY_NO_DATA_FIELD)
            .await?;
        let num_downloads = self
            .repositories_repo
            .get_or_create_field(repository.id, NUM_DOWNLOADS_FIELD)
            .await?;
        info!(
            repository = repository.name,
            start_url = request.start_url,
            "Starting OSF import"
        );
        Ok(RunContext {
            repository_id: repository.id,
            press_id: repository.press_id,
            email_domain: request.email_domain.clone(),
            conflict_of_interest_field_id: conflict_of_interest.id,
            why_no_data_field_id: why_no_data.id,
            num_downloads_field_id: num_downloads.id,
            licence_cache: HashMap::new(),
            licence_order: 0,
            summary: ImportSummary::default(),
        })
    }

    /// Transient errors are retried with exponential backoff up to `max_page_attempts`.
    async fn fetch_page_with_retry(&self, url: &str) -> Result<SourcePage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.source_repo.fetch_page(url).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt + 1 < self.max_page_attempts => {
                    let delay = self.retry_backoff * 2u32.pow(attempt);
                    warn!(%err, attempt, "Transient error fetching page, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn process_record(
        &self,
        ctx: &mut RunContext,
        raw: Value,
    ) -> Result<RecordOutcome, ImportError> {
        let record = normalize_preprint(raw)?;
        if record.is_withdrawn() {
            let marked = self
                .upsert_service
                .mark_withdrawn(ctx.repository_id, &record)
                .await?;
            info!(
                source_id = record.source_id,
                previously_imported = marked,
                "Skipping withdrawn record"
            );
            return Ok(RecordOutcome::Skipped);
        }

        let licence_id = self.resolve_licence(ctx, &record).await?;
        let (preprint, created) = self
            .upsert_service
            .upsert_article(ctx.repository_id, &record, licence_id)
            .await?;
        let upsert = &self.upsert_service;
        upsert
            .attach_subjects(ctx.repository_id, preprint.id, &record.subject_branches)
            .await?;
        upsert.attach_keywords(preprint.id, &record.tags).await?;
        upsert
            .attach_supplementary(preprint.id, &record.supplementary_links)
            .await?;

        let owner_id = match &record.contributors_url {
            Some(url) => {
                let document = self.source_repo.fetch_by_url(url).await?;
                let authors = normalize_contributors(&record.source_id, document, &ctx.email_domain)?;
                upsert.attach_authors(preprint.id, &authors, false).await?
            }
            None => None,
        };

        let (versions, downloads) = self.resolve_versions(&record).await?;
        let stored = upsert
            .store_versions(preprint.id, &versions, self.source_repo.as_ref())
            .await?;
        if stored.stored == 0 {
            warn!(source_id = record.source_id, "No file version could be stored");
        }

        let mut answers = Vec::new();
        if let Some(why_no_data) = &record.why_no_data {
            answers.push((ctx.why_no_data_field_id, why_no_data.clone()));
        }
        if let Some(statement) = &record.conflict_of_interest {
            answers.push((ctx.conflict_of_interest_field_id, statement.clone()));
        }
        if let Some(downloads) = downloads.filter(|downloads| *downloads > 0) {
            answers.push((ctx.num_downloads_field_id, downloads.to_string()));
        }
        upsert.attach_field_answers(preprint.id, answers).await?;

        upsert
            .finalize_article(preprint, stored.submission_file_id, owner_id)
            .await?;
        info!(source_id = record.source_id, created, "Imported record");
        Ok(if created {
            RecordOutcome::Created
        } else {
            RecordOutcome::Updated
        })
    }

    async fn resolve_licence(
        &self,
        ctx: &mut RunContext,
        record: &NormalizedPreprint,
    ) -> Result<Option<i32>, ImportError> {
        let Some(url) = &record.licence_url else {
            return Ok(None);
        };
        if let Some(cached) = ctx.licence_cache.get(url) {
            return Ok(*cached);
        }
        let document = self.source_repo.fetch_by_url(url).await?;
        let licence_id = match normalize_licence(&record.source_id, url, document)? {
            Some(licence) => {
                ctx.licence_order += 1;
                let (licence, created) = self
                    .upsert_service
                    .upsert_licence(ctx.press_id, &licence, ctx.licence_order)
                    .await?;
                if created {
                    info!(name = licence.name, "Created licence");
                }
                Some(licence.id)
            }
            None => None,
        };
        ctx.licence_cache.insert(url.clone(), licence_id);
        Ok(licence_id)
    }

    /// Follows files, storage provider, file listing and versions. Returns the versions and
    /// the download count of the file.
    async fn resolve_versions(
        &self,
        record: &NormalizedPreprint,
    ) -> Result<(Vec<NormalizedVersion>, Option<i64>), ImportError> {
        let source_id = record.source_id.as_str();
        let Some(files_url) = &record.files_url else {
            return Ok((vec![], None));
        };
        let providers = self.source_repo.fetch_by_url(files_url).await?;
        let Some(listing_url) = storage_listing_url(source_id, providers)? else {
            return Ok((vec![], None));
        };
        let listing = self.source_repo.fetch_by_url(&listing_url).await?;
        let Some(file) = normalize_storage_file(source_id, listing)? else {
            return Ok((vec![], None));
        };
        let document = self.source_repo.fetch_by_url(&file.versions_url).await?;
        let versions = normalize_versions(source_id, &file, document)?;
        Ok((versions, file.downloads))
    }
}

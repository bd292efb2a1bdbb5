//! Normalized value objects produced from source documents and consumed by the upsert engine.

use crate::models::common::WITHDRAWN_STATE;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDates {
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub published: NaiveDateTime,
    pub doi_created: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryLink {
    pub url: String,
    pub label: String,
    pub order: i32,
}

/// One OSF preprint, flattened. Relationship URLs are kept so the orchestrator can expand them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPreprint {
    pub source_id: String,
    pub working_identifier: String,
    pub review_state: String,
    pub title: String,
    pub abstract_text: String,
    pub dates: RecordDates,
    pub published_doi: Option<String>,
    pub licence_url: Option<String>,
    pub contributors_url: Option<String>,
    pub files_url: Option<String>,
    pub subject_branches: Vec<Vec<String>>,
    pub tags: Vec<String>,
    pub supplementary_links: Vec<SupplementaryLink>,
    pub conflict_of_interest: Option<String>,
    pub why_no_data: Option<String>,
}

impl NormalizedPreprint {
    pub fn is_withdrawn(&self) -> bool {
        self.review_state == WITHDRAWN_STATE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLicence {
    pub source_url: String,
    pub name: String,
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedAuthor {
    pub email: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub order: i32,
    /// Whether a login account should exist for this author.
    pub active: bool,
    pub corresponding: bool,
}

/// The file OSF lists first under the default storage provider.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageFile {
    pub file_id: String,
    pub name: String,
    pub current_version: Option<String>,
    pub downloads: Option<i64>,
    pub versions_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVersion {
    pub version_id: String,
    pub original_filename: String,
    /// `{parentFileId}_{versionId}{ext}`
    pub stored_filename: String,
    /// `{parentFileId}{ext}`, written by earlier importer releases.
    pub legacy_filename: String,
    pub mime_type: String,
    pub size: i64,
    pub created: NaiveDateTime,
    pub download_url: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectPath {
    pub parent: String,
    pub child: Option<String>,
}

/// One PLOS submission package after parsing its go file and JATS metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSubmission {
    pub reference_id: String,
    pub journal_code: String,
    pub metadata_filename: String,
    pub pdf_filename: String,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<NormalizedAuthor>,
    pub subjects: Vec<SubjectPath>,
    pub keywords: Vec<String>,
    pub conflict_of_interest: Option<String>,
    pub data_availability: Option<String>,
    pub data_links: Vec<String>,
}

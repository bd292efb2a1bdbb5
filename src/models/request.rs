//! Inputs for the persistence repositories' get-or-create and create calls.

use chrono::NaiveDateTime;

/// Custom field provisioned on a repository before an import run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLicence {
    pub press_id: i32,
    pub name: String,
    pub short_name: String,
    pub url: String,
    pub text: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubject {
    pub repository_id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
}

/// Natural key of a preprint inside one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprintKey {
    PreprintDoi(String),
    SourceReference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreprint {
    pub repository_id: i32,
    pub licence_id: Option<i32>,
    pub title: String,
    pub abstract_text: String,
    pub stage: String,
    pub current_step: i32,
    pub comments_editor: Option<String>,
    pub preprint_decision_notification: bool,
    pub doi: Option<String>,
    pub preprint_doi: Option<String>,
    pub source_reference: Option<String>,
    pub date_started: Option<NaiveDateTime>,
    pub date_submitted: Option<NaiveDateTime>,
    pub date_accepted: Option<NaiveDateTime>,
    pub date_published: Option<NaiveDateTime>,
    pub date_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewAuthor {
    pub email_address: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub orcid: Option<String>,
    pub institution: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreprintAuthor {
    pub preprint_id: i32,
    pub author_id: i32,
    pub account_id: Option<i32>,
    pub order: i32,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreprintFile {
    pub preprint_id: i32,
    pub file: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size: i64,
    pub uploaded: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreprintVersion {
    pub preprint_id: i32,
    pub file_id: i32,
    pub version: String,
    pub date_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSupplementaryFile {
    pub preprint_id: i32,
    pub url: String,
    pub label: String,
    pub order: i32,
}

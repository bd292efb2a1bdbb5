//! SeaORM entity models for the publishing platform's preprint and journal schema.

pub mod prelude;

pub mod account;
pub mod article;
pub mod article_author;
pub mod author;
pub mod journal;
pub mod keyword;
pub mod licence;
pub mod preprint;
pub mod preprint_author;
pub mod preprint_file;
pub mod preprint_keyword;
pub mod preprint_subject;
pub mod preprint_supplementary_file;
pub mod preprint_version;
pub mod repo_ezid_settings;
pub mod repository;
pub mod repository_field;
pub mod repository_field_answer;
pub mod subject;
pub mod workflow_log;

//! Error taxonomy for import runs, identifier registration and the operator commands.
//!
//! Record-level errors ([`RecordNormalizationError`]) are caught by the orchestrators and
//! counted; run-level errors ([`ImportError`], [`CommandError`]) abort before further writes.

use reqwest::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

/// Failures talking to a remote source API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or a 5xx status. The same cursor may be requested again.
    #[error("transient fetch error for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Any other non-success status. 401 and 403 stop the run, the rest fail one record.
    #[error("fatal fetch error for {url}: HTTP {status}")]
    Fatal { url: String, status: StatusCode },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// 401 or 403: every further request of the run would fail the same way.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            FetchError::Fatal { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// One source record could not be mapped onto the internal model.
#[derive(Debug, Error)]
#[error("record {source_id} could not be normalized: {reason}")]
pub struct RecordNormalizationError {
    pub source_id: String,
    pub reason: String,
}

impl RecordNormalizationError {
    pub fn new(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

/// The identifier registration service refused a request or could not be reached.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registration service answered HTTP {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("registration failed: {0}")]
    Failed(String),
}

/// An operator command cannot proceed. Nothing has been written when this is returned.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("no repository found named {0}")]
    RepositoryNotFound(String),

    #[error("no preprint found with {0}")]
    PreprintNotFound(String),

    #[error("no account found with email {0}")]
    AccountNotFound(String),

    #[error("no author found with email {0}")]
    AuthorNotFound(String),

    #[error("no licence found named {0}")]
    LicenceNotFound(String),

    #[error("no article found with id {0}")]
    ArticleNotFound(i32),

    #[error("repository {0} has no identifier registration settings")]
    MissingRegistrationSettings(String),

    #[error("no EZID credentials for {0}: set them in its EZID settings or the EZID_* env vars")]
    MissingCredentials(String),

    #[error("{0}")]
    InvalidState(String),
}

/// Missing or malformed environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0} env var")]
    Missing(&'static str),

    #[error("invalid {name} env var: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors that abort a whole import run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalization(#[from] RecordNormalizationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the single-shot operator commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("nothing to do: {0}")]
    NothingToDo(String),
}

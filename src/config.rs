//! Configuration for the import runs and the identifier registration client.
//! Values come from environment variables, optionally loaded from a `.env` file.

use crate::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use validator::Validate;

pub const DEFAULT_OSF_API_BASE: &str = "https://api.osf.io/v2";
const DEFAULT_FILES_BASE_DIR: &str = "files";

/// Credentials and endpoint for the EZID registration service
#[derive(Debug, Clone, Default, Validate)]
pub struct EzidConfig {
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
    #[validate(url)]
    pub endpoint_url: String,
}

/// Locations and defaults for the PLOS XML feed
#[derive(Debug, Clone, Default)]
pub struct PlosConfig {
    pub source_dir: PathBuf,
    pub working_dir: PathBuf,
    pub done_dir: PathBuf,
    pub error_dir: PathBuf,
    pub repository_name: String,
    pub licence_name: String,
}

/// Global application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database_url: String,
    pub osf_token: Option<String>,
    pub osf_api_base: String,
    pub files_base_dir: PathBuf,
    pub site_base_url: String,
    pub plos: Option<PlosConfig>,
    pub ezid: Option<EzidConfig>,
}

impl AppConfig {
    pub fn require_osf_token(&self) -> Result<&str, ConfigError> {
        self.osf_token
            .as_deref()
            .ok_or(ConfigError::Missing("OSF_TOKEN"))
    }

    pub fn require_plos(&self) -> Result<&PlosConfig, ConfigError> {
        self.plos
            .as_ref()
            .ok_or(ConfigError::Missing("PLOS_WORKING_DIR"))
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn build_plos_config() -> Result<Option<PlosConfig>, ConfigError> {
    let Some(working_dir) = optional("PLOS_WORKING_DIR") else {
        return Ok(None);
    };
    let source_dir = required("PLOS_SOURCE_DIR")?;
    let done_dir = required("PLOS_DONE_DIR")?;
    let error_dir = required("PLOS_ERROR_DIR")?;
    let repository_name = required("PLOS_REPOSITORY_NAME")?;
    let licence_name =
        optional("PLOS_LICENCE_NAME").unwrap_or_else(|| "CC BY 4.0".to_string());
    Ok(Some(PlosConfig {
        source_dir: PathBuf::from(source_dir),
        working_dir: PathBuf::from(working_dir),
        done_dir: PathBuf::from(done_dir),
        error_dir: PathBuf::from(error_dir),
        repository_name,
        licence_name,
    }))
}

fn build_ezid_config() -> Result<Option<EzidConfig>, ConfigError> {
    let Some(username) = optional("EZID_USERNAME") else {
        return Ok(None);
    };
    let password = required("EZID_PASSWORD")?;
    let endpoint_url = required("EZID_ENDPOINT_URL")?;
    let ezid = EzidConfig {
        username,
        password,
        endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
    };
    ezid.validate().map_err(|err| ConfigError::Invalid {
        name: "EZID_ENDPOINT_URL",
        reason: err.to_string(),
    })?;
    Ok(Some(ezid))
}

/// Builds application configuration from environment variables
pub fn build_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let database_url = required("DATABASE_URL")?;
    let osf_token = optional("OSF_TOKEN");
    let osf_api_base = optional("OSF_API_BASE")
        .unwrap_or_else(|| DEFAULT_OSF_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string();
    let files_base_dir = optional("FILES_BASE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILES_BASE_DIR));
    let site_base_url = optional("SITE_BASE_URL")
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string();
    Ok(AppConfig {
        database_url,
        osf_token,
        osf_api_base,
        files_base_dir,
        site_base_url,
        plos: build_plos_config()?,
        ezid: build_ezid_config()?,
    })
}

mod auth;
mod config;
mod errors;
mod models;
mod normalizer;
mod repos;
mod services;
#[cfg(test)]
mod test_tools;

use crate::config::{build_app_config, AppConfig};
use crate::errors::{CommandError, ConfigError, ImportError};
use crate::models::response::{ImportSummary, MergeOutcome};
use crate::repos::ezid_repo::HTTPEzidRepo;
use crate::repos::files_repo::LocalFilesRepo;
use crate::repos::journals_repo::DBJournalsRepo;
use crate::repos::osf_repo::HTTPOsfRepo;
use crate::repos::people_repo::DBPeopleRepo;
use crate::repos::preprints_repo::DBPreprintsRepo;
use crate::repos::repositories_repo::DBRepositoriesRepo;
use crate::repos::submissions_repo::DirectorySubmissionSource;
use crate::services::accounts_service::AccountsService;
use crate::services::ezid_service::{EzidService, PreprintLocator};
use crate::services::osf_import_service::{
    OsfImportRequest, OsfImportService, DEFAULT_MAX_PAGE_ATTEMPTS, DEFAULT_RETRY_BACKOFF,
};
use crate::services::plos_import_service::PlosImportService;
use crate::services::upsert_service::UpsertService;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use reqwest::Client;
use sea_orm::{Database, DatabaseConnection};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const FAILED_EXIT: u8 = 1;
const PRECONDITION_EXIT: u8 = 2;
const NOTHING_TO_DO_EXIT: u8 = 3;

#[derive(Parser)]
#[command(
    name = "preprint-ingest",
    about = "Imports preprints into a repository and registers their DOIs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every preprint of an OSF provider into a repository.
    ImportOsf {
        repository_name: String,
        provider: String,
        /// Domain of the synthesized author emails, defaults to `{provider}.org`.
        #[arg(long)]
        email_domain: Option<String>,
    },

    /// Import the packages waiting in the PLOS feed directory.
    ImportPlos,

    /// Mint a DOI under the repository's shoulder.
    MintDoi { short_name: String, preprint_id: i32 },

    /// Send current metadata for a preprint that already has a DOI.
    UpdateDoi {
        short_name: String,
        /// Preprint id or DOI URL.
        preprint: PreprintLocator,
    },

    /// Register a preprint at an explicit identifier.
    RegisterDoi {
        short_name: String,
        preprint_id: i32,
        doi: String,
    },

    /// Register the DOI a journal assigned to one of its articles.
    RegisterJournalDoi { article_id: i32 },

    /// Send current metadata for a journal article's registered DOI.
    UpdateJournalDoi { article_id: i32 },

    /// Move preprints from an inactive proxy account to an active account.
    MovePreprints {
        active_email: String,
        proxy_email: String,
    },

    /// Fold a proxy author into the author using the active email.
    MergeAuthorEmail {
        active_email: String,
        proxy_email: String,
        /// Apply the merge instead of describing it.
        #[arg(long)]
        yes: bool,
    },

    /// Print active accounts that share a last name.
    ReportDuplicateLastNames,

    /// Print submitted preprints without a workflow log.
    ReportMissingWorkflowLogs,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn config_exit(err: ConfigError) -> ExitCode {
    error!(%err, "Invalid configuration");
    ExitCode::from(PRECONDITION_EXIT)
}

fn import_exit(result: Result<ImportSummary, ImportError>) -> ExitCode {
    match result {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(ImportError::Precondition(err)) => {
            error!(%err, "Import could not start");
            ExitCode::from(PRECONDITION_EXIT)
        }
        Err(err) => {
            error!(%err, "Import aborted");
            ExitCode::from(FAILED_EXIT)
        }
    }
}

fn command_exit(result: Result<String, CommandError>) -> ExitCode {
    match result {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(CommandError::NothingToDo(message)) => {
            info!(reason = %message, "Nothing to do");
            ExitCode::from(NOTHING_TO_DO_EXIT)
        }
        Err(CommandError::Precondition(err)) => {
            error!(%err, "Precondition failed");
            ExitCode::from(PRECONDITION_EXIT)
        }
        Err(err) => {
            error!(%err, "Command failed");
            ExitCode::from(FAILED_EXIT)
        }
    }
}

fn upsert_service(db_session: &DatabaseConnection, config: &AppConfig) -> UpsertService {
    UpsertService {
        preprints_repo: Arc::new(DBPreprintsRepo {
            db_session: db_session.clone(),
        }),
        people_repo: Arc::new(DBPeopleRepo {
            db_session: db_session.clone(),
        }),
        files_repo: Arc::new(LocalFilesRepo {
            base_dir: config.files_base_dir.clone(),
        }),
    }
}

fn ezid_service(db_session: &DatabaseConnection, config: &AppConfig) -> EzidService {
    EzidService {
        ezid_repo: Arc::new(HTTPEzidRepo {
            client: Client::new(),
        }),
        repositories_repo: Arc::new(DBRepositoriesRepo {
            db_session: db_session.clone(),
        }),
        preprints_repo: Arc::new(DBPreprintsRepo {
            db_session: db_session.clone(),
        }),
        people_repo: Arc::new(DBPeopleRepo {
            db_session: db_session.clone(),
        }),
        journals_repo: Arc::new(DBJournalsRepo {
            db_session: db_session.clone(),
        }),
        default_credentials: config.ezid.clone(),
        site_base_url: config.site_base_url.clone(),
    }
}

fn accounts_service(db_session: &DatabaseConnection) -> AccountsService {
    AccountsService {
        people_repo: Arc::new(DBPeopleRepo {
            db_session: db_session.clone(),
        }),
        preprints_repo: Arc::new(DBPreprintsRepo {
            db_session: db_session.clone(),
        }),
    }
}

async fn run(command: Commands, config: AppConfig, db_session: DatabaseConnection) -> ExitCode {
    match command {
        Commands::ImportOsf {
            repository_name,
            provider,
            email_domain,
        } => {
            let token = match config.require_osf_token() {
                Ok(token) => token.to_string(),
                Err(err) => return config_exit(err),
            };
            let service = OsfImportService {
                source_repo: Arc::new(HTTPOsfRepo {
                    client: Client::new(),
                    token,
                }),
                repositories_repo: Arc::new(DBRepositoriesRepo {
                    db_session: db_session.clone(),
                }),
                upsert_service: upsert_service(&db_session, &config),
                max_page_attempts: DEFAULT_MAX_PAGE_ATTEMPTS,
                retry_backoff: DEFAULT_RETRY_BACKOFF,
            };
            let request = OsfImportRequest {
                repository_name,
                start_url: HTTPOsfRepo::preprints_url(&config.osf_api_base, &provider),
                email_domain: email_domain.unwrap_or_else(|| format!("{provider}.org")),
            };
            import_exit(service.run(request).await)
        }
        Commands::ImportPlos => {
            let plos = match config.require_plos() {
                Ok(plos) => plos.clone(),
                Err(err) => return config_exit(err),
            };
            let service = PlosImportService {
                submissions_repo: Arc::new(DirectorySubmissionSource {
                    dir: plos.source_dir.clone(),
                }),
                repositories_repo: Arc::new(DBRepositoriesRepo {
                    db_session: db_session.clone(),
                }),
                upsert_service: upsert_service(&db_session, &config),
                config: plos,
            };
            import_exit(service.run().await)
        }
        Commands::MintDoi {
            short_name,
            preprint_id,
        } => command_exit(
            ezid_service(&db_session, &config)
                .mint(&short_name, preprint_id)
                .await
                .map(|doi| format!("minted {doi} for preprint {preprint_id}")),
        ),
        Commands::UpdateDoi {
            short_name,
            preprint,
        } => command_exit(
            ezid_service(&db_session, &config)
                .update(&short_name, preprint)
                .await
                .map(|doi| format!("updated metadata for {doi}")),
        ),
        Commands::RegisterDoi {
            short_name,
            preprint_id,
            doi,
        } => command_exit(
            ezid_service(&db_session, &config)
                .create(&short_name, preprint_id, &doi)
                .await
                .map(|doi| format!("registered {doi} for preprint {preprint_id}")),
        ),
        Commands::RegisterJournalDoi { article_id } => command_exit(
            ezid_service(&db_session, &config)
                .register_journal_article(article_id)
                .await
                .map(|doi| format!("registered {doi} for article {article_id}")),
        ),
        Commands::UpdateJournalDoi { article_id } => command_exit(
            ezid_service(&db_session, &config)
                .update_journal_article(article_id)
                .await
                .map(|doi| format!("updated metadata for {doi}")),
        ),
        Commands::MovePreprints {
            active_email,
            proxy_email,
        } => command_exit(
            accounts_service(&db_session)
                .move_preprints(&active_email, &proxy_email)
                .await
                .map(|moved| {
                    format!(
                        "moved {} owned preprints and {} author links to {active_email}",
                        moved.owned_preprints, moved.author_links
                    )
                }),
        ),
        Commands::MergeAuthorEmail {
            active_email,
            proxy_email,
            yes,
        } => command_exit(
            accounts_service(&db_session)
                .merge_author_email(&active_email, &proxy_email, yes)
                .await
                .map(|outcome| match outcome {
                    MergeOutcome::Renamed { author_id } => {
                        format!("author {author_id} now uses {active_email}")
                    }
                    MergeOutcome::Merged {
                        kept_author_id,
                        links,
                    } => format!(
                        "merged into author {kept_author_id}, moved {} links, dropped {} duplicate links",
                        links.moved, links.dropped_duplicates
                    ),
                    MergeOutcome::Planned { description } => {
                        format!("{description}\nre-run with --yes to apply")
                    }
                }),
        ),
        Commands::ReportDuplicateLastNames => {
            command_exit(accounts_service(&db_session).duplicate_last_names_report().await)
        }
        Commands::ReportMissingWorkflowLogs => {
            command_exit(accounts_service(&db_session).missing_workflow_logs_report().await)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config = match build_app_config() {
        Ok(config) => config,
        Err(err) => return config_exit(err),
    };
    let db_session = match Database::connect(config.database_url.as_str()).await {
        Ok(db_session) => db_session,
        Err(err) => {
            error!(%err, "Could not connect to db");
            return ExitCode::from(FAILED_EXIT);
        }
    };
    if let Err(err) = Migrator::up(&db_session, None).await {
        error!(%err, "Could not apply migrations");
        return ExitCode::from(FAILED_EXIT);
    }
    run(cli.command, config, db_session).await
}

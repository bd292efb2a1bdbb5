//! DOI registration through EZID, for published preprints and for journal articles.
//!
//! The service checks the preconditions, builds the Crossref payload from the stored
//! preprint or article, sends it, and for preprints writes the identifier EZID answers with
//! back. Failures are reported and never retried. A repository's own EZID credentials are
//! used when its settings carry them, the `EZID_*` environment otherwise.

use crate::config::EzidConfig;
use crate::errors::{CommandError, PreconditionError, RegistrationError};
use crate::models::ezid::{
    Contributor, IdentifierState, JournalArticle, PostedContent, RegistrationOutcome,
};
use crate::models::request::PreprintKey;
use crate::repos::ezid_repo::EzidRepo;
use crate::repos::journals_repo::JournalsRepo;
use crate::repos::people_repo::PeopleRepo;
use crate::repos::preprints_repo::PreprintsRepo;
use crate::repos::repositories_repo::RepositoriesRepo;
use crate::services::upsert_service::PUBLISHED_STAGE;
use ::entity::author::Model as AuthorModel;
use ::entity::preprint::Model as PreprintModel;
use ::entity::repo_ezid_settings::Model as RepoEzidSettingsModel;
use ::entity::repository::Model as RepositoryModel;
use chrono::Utc;
use reqwest::Url;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

/// How the operator names the preprint: its id, or the full DOI URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprintLocator {
    Id(i32),
    Doi(String),
}

impl FromStr for PreprintLocator {
    type Err = PreconditionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.starts_with("http") {
            let url = Url::parse(value).map_err(|err| {
                PreconditionError::InvalidState(format!("invalid DOI URL {value}: {err}"))
            })?;
            return Ok(PreprintLocator::Doi(
                url.path().trim_start_matches('/').to_string(),
            ));
        }
        value
            .parse()
            .map(PreprintLocator::Id)
            .map_err(|_| PreconditionError::InvalidState(format!("invalid preprint id {value}")))
    }
}

#[derive(Clone)]
pub struct EzidService {
    pub ezid_repo: Arc<dyn EzidRepo>,
    pub repositories_repo: Arc<dyn RepositoriesRepo>,
    pub preprints_repo: Arc<dyn PreprintsRepo>,
    pub people_repo: Arc<dyn PeopleRepo>,
    pub journals_repo: Arc<dyn JournalsRepo>,
    /// Credentials from the environment, used when a repository has none of its own.
    pub default_credentials: Option<EzidConfig>,
    pub site_base_url: String,
}

/// A repository together with everything needed to register under it.
struct RegistrationAccount {
    repository: RepositoryModel,
    settings: RepoEzidSettingsModel,
    credentials: EzidConfig,
}

enum Operation<'a> {
    Mint,
    Create(&'a str),
    Update(String),
}

#[derive(Debug, Clone, Copy)]
enum JournalOperation {
    Create,
    Update,
}

fn stored_value(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|value| !value.trim().is_empty()).cloned()
}

fn author_contributor(author: AuthorModel) -> Contributor {
    Contributor {
        given_name: author.first_name,
        surname: author.last_name,
        orcid: author.orcid,
    }
}

impl EzidService {
    /// Mints a DOI under the repository's shoulder.
    ///
    /// # Arguments
    /// * `short_name` - Short name of the repository holding the preprint
    /// * `preprint_id` - Id of a published preprint without a DOI
    ///
    /// # Returns
    /// The minted identifier
    pub async fn mint(&self, short_name: &str, preprint_id: i32) -> Result<String, CommandError> {
        let account = self.load_account(short_name).await?;
        let preprint = self
            .load_preprint(&account.repository, PreprintLocator::Id(preprint_id))
            .await?;
        let state = IdentifierState::from_preprint_doi(preprint.preprint_doi.as_deref())
            .request_mint()?;
        self.register(&account, preprint, state, Operation::Mint)
            .await
    }

    /// Registers the preprint at an identifier chosen by the operator.
    pub async fn create(
        &self,
        short_name: &str,
        preprint_id: i32,
        identifier: &str,
    ) -> Result<String, CommandError> {
        let account = self.load_account(short_name).await?;
        let preprint = self
            .load_preprint(&account.repository, PreprintLocator::Id(preprint_id))
            .await?;
        let state = IdentifierState::from_preprint_doi(preprint.preprint_doi.as_deref())
            .request_mint()?;
        self.register(&account, preprint, state, Operation::Create(identifier))
            .await
    }

    /// Sends the current metadata of a preprint that already has a DOI.
    pub async fn update(
        &self,
        short_name: &str,
        locator: PreprintLocator,
    ) -> Result<String, CommandError> {
        let account = self.load_account(short_name).await?;
        let preprint = self.load_preprint(&account.repository, locator).await?;
        let state = IdentifierState::from_preprint_doi(preprint.preprint_doi.as_deref())
            .request_update()?;
        let IdentifierState::UpdateRequested(identifier) = &state else {
            let reason = format!("unexpected state {state:?}");
            return Err(PreconditionError::InvalidState(reason).into());
        };
        let operation = Operation::Update(identifier.clone());
        self.register(&account, preprint, state, operation).await
    }

    /// Registers the DOI a journal assigned to one of its articles.
    pub async fn register_journal_article(&self, article_id: i32) -> Result<String, CommandError> {
        self.send_journal_article(article_id, JournalOperation::Create)
            .await
    }

    /// Sends the current metadata of a journal article whose DOI is already registered.
    pub async fn update_journal_article(&self, article_id: i32) -> Result<String, CommandError> {
        self.send_journal_article(article_id, JournalOperation::Update)
            .await
    }

    async fn load_account(&self, short_name: &str) -> Result<RegistrationAccount, CommandError> {
        let repository = self
            .repositories_repo
            .get_by_short_name(short_name)
            .await?
            .ok_or_else(|| PreconditionError::RepositoryNotFound(short_name.to_string()))?;
        let settings = self
            .repositories_repo
            .get_ezid_settings(repository.id)
            .await?
            .ok_or_else(|| PreconditionError::MissingRegistrationSettings(short_name.to_string()))?;
        let credentials = self.credentials_for(short_name, &settings)?;
        Ok(RegistrationAccount {
            repository,
            settings,
            credentials,
        })
    }

    /// The repository's own credentials when all three are stored, the defaults otherwise.
    fn credentials_for(
        &self,
        short_name: &str,
        settings: &RepoEzidSettingsModel,
    ) -> Result<EzidConfig, PreconditionError> {
        let stored = (
            stored_value(&settings.ezid_username),
            stored_value(&settings.ezid_password),
            stored_value(&settings.ezid_endpoint_url),
        );
        let (Some(username), Some(password), Some(endpoint_url)) = stored else {
            return self
                .default_credentials
                .clone()
                .ok_or_else(|| PreconditionError::MissingCredentials(short_name.to_string()));
        };
        let credentials = EzidConfig {
            username,
            password,
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
        };
        credentials.validate().map_err(|err| {
            let reason = format!("invalid EZID settings for {short_name}: {err}");
            PreconditionError::InvalidState(reason)
        })?;
        Ok(credentials)
    }

    async fn load_preprint(
        &self,
        repository: &RepositoryModel,
        locator: PreprintLocator,
    ) -> Result<PreprintModel, CommandError> {
        let preprint = match &locator {
            PreprintLocator::Id(id) => self.preprints_repo.get_preprint(repository.id, *id).await?,
            PreprintLocator::Doi(doi) => {
                self.preprints_repo
                    .find_preprint(repository.id, &PreprintKey::PreprintDoi(doi.clone()))
                    .await?
            }
        };
        let preprint = preprint.ok_or_else(|| {
            PreconditionError::PreprintNotFound(match locator {
                PreprintLocator::Id(id) => format!("id {id}"),
                PreprintLocator::Doi(doi) => format!("preprint DOI {doi}"),
            })
        })?;
        let published = preprint.stage == PUBLISHED_STAGE
            && preprint
                .date_published
                .is_some_and(|published| published <= Utc::now().naive_utc());
        if !published {
            return Err(PreconditionError::InvalidState(format!(
                "preprint {} is not yet published",
                preprint.id
            ))
            .into());
        }
        Ok(preprint)
    }

    pub fn target_url(&self, short_name: &str, preprint_id: i32) -> String {
        format!(
            "{}/{}/preprints/{}/",
            self.site_base_url.trim_end_matches('/'),
            short_name,
            preprint_id
        )
    }

    async fn posted_content(
        &self,
        repository: &RepositoryModel,
        preprint: &PreprintModel,
    ) -> Result<PostedContent, CommandError> {
        let group_title = self
            .preprints_repo
            .subjects_for(preprint.id)
            .await?
            .into_iter()
            .next()
            .map(|subject| subject.name)
            .ok_or_else(|| {
                PreconditionError::InvalidState(format!("preprint {} has no subject", preprint.id))
            })?;
        let contributors = self
            .people_repo
            .authors_for(preprint.id)
            .await?
            .into_iter()
            .map(|(_, author, account)| match account {
                Some(account) => Contributor {
                    given_name: account.first_name,
                    surname: account.last_name,
                    orcid: account.orcid.or(author.orcid),
                },
                None => author_contributor(author),
            })
            .collect();
        let posted = preprint.date_published.unwrap_or_default();
        Ok(PostedContent {
            group_title,
            contributors,
            title: preprint.title.clone(),
            abstract_text: preprint.abstract_text.clone(),
            posted_date: posted.into(),
            acceptance_date: preprint.date_accepted.unwrap_or(posted).into(),
            published_doi: preprint.doi.clone(),
            target_url: self.target_url(&repository.short_name, preprint.id),
            timestamp: Utc::now(),
        })
    }

    async fn register(
        &self,
        account: &RegistrationAccount,
        preprint: PreprintModel,
        state: IdentifierState,
        operation: Operation<'_>,
    ) -> Result<String, CommandError> {
        let payload = self
            .posted_content(&account.repository, &preprint)
            .await?
            .envelope(&account.settings.ezid_owner);
        let credentials = &account.credentials;
        let sent = match &operation {
            Operation::Mint => {
                self.ezid_repo
                    .mint(credentials, &account.settings.ezid_shoulder, payload)
                    .await
            }
            Operation::Create(identifier) => {
                self.ezid_repo.create(credentials, identifier, payload).await
            }
            Operation::Update(identifier) => {
                self.ezid_repo.update(credentials, identifier, payload).await
            }
        };
        let body = sent.inspect_err(|err| {
            error!(preprint_id = preprint.id, %err, "DOI registration request failed");
        })?;
        let outcome = RegistrationOutcome::parse(&body);
        match state.complete(&outcome) {
            IdentifierState::Registered(identifier) => {
                if preprint.preprint_doi.as_deref() != Some(identifier.as_str()) {
                    let mut registered = preprint;
                    registered.preprint_doi = Some(identifier.clone());
                    self.preprints_repo.update_preprint(registered).await?;
                }
                info!(identifier, "DOI registered");
                Ok(identifier)
            }
            IdentifierState::MintFailed(message)
            | IdentifierState::UpdateFailed { message, .. } => {
                error!(preprint_id = preprint.id, message, "DOI registration failed");
                Err(RegistrationError::Failed(message).into())
            }
            other => Err(RegistrationError::Failed(format!("unexpected state {other:?}")).into()),
        }
    }

    async fn send_journal_article(
        &self,
        article_id: i32,
        operation: JournalOperation,
    ) -> Result<String, CommandError> {
        let article = self
            .journals_repo
            .get_article(article_id)
            .await?
            .ok_or(PreconditionError::ArticleNotFound(article_id))?;
        let invalid = |reason: &str| {
            PreconditionError::InvalidState(format!("article {article_id} {reason}"))
        };
        let journal = self
            .journals_repo
            .get_journal(article.journal_id)
            .await?
            .ok_or_else(|| invalid("has no journal"))?;
        let registrant = stored_value(&journal.crossref_registrant)
            .ok_or_else(|| PreconditionError::MissingRegistrationSettings(journal.code.clone()))?;
        let doi = stored_value(&article.doi).ok_or_else(|| invalid("has no DOI"))?;
        let target_url =
            stored_value(&article.remote_url).ok_or_else(|| invalid("has no remote URL"))?;
        let published = article
            .date_published
            .ok_or_else(|| invalid("is not published"))?;
        let credentials = self
            .default_credentials
            .as_ref()
            .ok_or_else(|| PreconditionError::MissingCredentials(journal.code.clone()))?;

        let contributors = self
            .journals_repo
            .authors_for_article(article_id)
            .await?
            .into_iter()
            .map(author_contributor)
            .collect();
        let payload = JournalArticle {
            journal_title: journal.name.clone(),
            issn: journal.issn.clone(),
            contributors,
            title: article.title.clone(),
            abstract_text: article.abstract_text.clone(),
            publication_date: published.into(),
            doi: doi.clone(),
            target_url,
            timestamp: Utc::now(),
        }
        .envelope(&registrant);
        let sent = match operation {
            JournalOperation::Create => self.ezid_repo.create(credentials, &doi, payload).await,
            JournalOperation::Update => self.ezid_repo.update(credentials, &doi, payload).await,
        };
        let body = sent.inspect_err(|err| {
            error!(article_id, ?operation, %err, "Journal DOI request failed");
        })?;
        match RegistrationOutcome::parse(&body) {
            RegistrationOutcome::Success { identifier } => {
                info!(article_id, ?operation, identifier, "Journal DOI registered");
                Ok(identifier)
            }
            RegistrationOutcome::Failure { message } => {
                error!(article_id, ?operation, message, "Journal DOI registration failed");
                Err(RegistrationError::Failed(message).into())
            }
        }
    }
}

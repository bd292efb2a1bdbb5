//! Account maintenance commands: moving preprints off proxy accounts, merging duplicate
//! authors and the two consistency reports.

use crate::errors::{CommandError, PreconditionError};
use crate::models::response::{MergeOutcome, MoveSummary};
use crate::repos::people_repo::PeopleRepo;
use crate::repos::preprints_repo::PreprintsRepo;
use ::entity::author::Model as AuthorModel;
use std::sync::Arc;
use tracing::info;

pub const DUPLICATE_LAST_NAMES_HEADER: &str = "last_name,first_name,middle_name,email,id";
pub const MISSING_WORKFLOW_LOGS_HEADER: &str = "id,date_submitted,current_step";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Keeps every value of `active` and fills its gaps from `proxy`.
pub fn merge_author_metadata(active: AuthorModel, proxy: &AuthorModel) -> AuthorModel {
    AuthorModel {
        first_name: active.first_name.or_else(|| proxy.first_name.clone()),
        middle_name: active.middle_name.or_else(|| proxy.middle_name.clone()),
        last_name: active.last_name.or_else(|| proxy.last_name.clone()),
        orcid: active.orcid.or_else(|| proxy.orcid.clone()),
        affiliation: active.affiliation.or_else(|| proxy.affiliation.clone()),
        ..active
    }
}

#[derive(Clone)]
pub struct AccountsService {
    pub people_repo: Arc<dyn PeopleRepo>,
    pub preprints_repo: Arc<dyn PreprintsRepo>,
}

impl AccountsService {
    /// Moves everything owned by the inactive proxy account to the active account and
    /// deletes the proxy.
    ///
    /// # Arguments
    /// * `active_email` - Email of the account that keeps the preprints
    /// * `proxy_email` - Email of the inactive account created by an import
    pub async fn move_preprints(
        &self,
        active_email: &str,
        proxy_email: &str,
    ) -> Result<MoveSummary, CommandError> {
        if active_email.eq_ignore_ascii_case(proxy_email) {
            return Err(PreconditionError::InvalidState(
                "source and destination accounts are the same".to_string(),
            )
            .into());
        }
        let active = self
            .people_repo
            .get_account_by_email(active_email)
            .await?
            .ok_or_else(|| PreconditionError::AccountNotFound(active_email.to_string()))?;
        let proxy = self
            .people_repo
            .get_account_by_email(proxy_email)
            .await?
            .ok_or_else(|| PreconditionError::AccountNotFound(proxy_email.to_string()))?;
        if active.id == proxy.id {
            return Err(PreconditionError::InvalidState(
                "source and destination accounts are the same".to_string(),
            )
            .into());
        }
        if !active.is_active {
            return Err(PreconditionError::InvalidState(format!(
                "account {active_email} is not active"
            ))
            .into());
        }
        if proxy.is_active {
            return Err(PreconditionError::InvalidState(format!(
                "account {proxy_email} is active and cannot be used as a proxy"
            ))
            .into());
        }
        let summary = self.people_repo.transfer_account(proxy.id, active.id).await?;
        info!(
            from = proxy_email,
            to = active_email,
            owned_preprints = summary.owned_preprints,
            author_links = summary.author_links,
            "Moved preprints between accounts"
        );
        Ok(summary)
    }

    /// Points the proxy author's preprints at the author using `active_email`.
    ///
    /// Without `confirm` nothing is written and the planned change is described instead.
    pub async fn merge_author_email(
        &self,
        active_email: &str,
        proxy_email: &str,
        confirm: bool,
    ) -> Result<MergeOutcome, CommandError> {
        let proxy = self
            .people_repo
            .get_author_by_email(proxy_email)
            .await?
            .ok_or_else(|| PreconditionError::AuthorNotFound(proxy_email.to_string()))?;
        let Some(active) = self.people_repo.get_author_by_email(active_email).await? else {
            if !confirm {
                return Ok(MergeOutcome::Planned {
                    description: format!(
                        "rename author {} from {proxy_email} to {active_email}",
                        proxy.id
                    ),
                });
            }
            let renamed = self
                .people_repo
                .rename_author_email(proxy.id, active_email)
                .await?;
            info!(author_id = renamed.id, email = active_email, "Renamed author email");
            return Ok(MergeOutcome::Renamed {
                author_id: renamed.id,
            });
        };
        if active.id == proxy.id {
            return Err(PreconditionError::InvalidState(
                "both emails belong to the same author".to_string(),
            )
            .into());
        }
        let kept_author_id = active.id;
        if !confirm {
            return Ok(MergeOutcome::Planned {
                description: format!(
                    "merge author {} ({proxy_email}) into author {kept_author_id} ({active_email})",
                    proxy.id
                ),
            });
        }
        let merged = merge_author_metadata(active, &proxy);
        let links = self.people_repo.merge_authors(merged, proxy.id).await?;
        info!(
            kept_author_id,
            removed_author_id = proxy.id,
            moved_links = links.moved,
            dropped_duplicates = links.dropped_duplicates,
            "Merged authors"
        );
        Ok(MergeOutcome::Merged {
            kept_author_id,
            links,
        })
    }

    /// CSV of active accounts whose last name another active account shares.
    pub async fn duplicate_last_names_report(&self) -> Result<String, CommandError> {
        let accounts = self.people_repo.accounts_sharing_last_name().await?;
        if accounts.is_empty() {
            return Err(CommandError::NothingToDo(
                "no active accounts share a last name".to_string(),
            ));
        }
        let mut lines = vec![DUPLICATE_LAST_NAMES_HEADER.to_string()];
        for account in accounts {
            lines.push(
                [
                    csv_field(account.last_name.as_deref().unwrap_or_default()),
                    csv_field(account.first_name.as_deref().unwrap_or_default()),
                    csv_field(account.middle_name.as_deref().unwrap_or_default()),
                    csv_field(&account.email),
                    account.id.to_string(),
                ]
                .join(","),
            );
        }
        Ok(lines.join("\n"))
    }

    /// CSV of submitted preprints that have no workflow log entry.
    pub async fn missing_workflow_logs_report(&self) -> Result<String, CommandError> {
        let preprints = self.preprints_repo.list_missing_workflow_logs().await?;
        if preprints.is_empty() {
            return Err(CommandError::NothingToDo(
                "every submitted preprint has a workflow log".to_string(),
            ));
        }
        let mut lines = vec![MISSING_WORKFLOW_LOGS_HEADER.to_string()];
        for preprint in preprints {
            let submitted = preprint
                .date_submitted
                .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            lines.push(format!("{},{},{}", preprint.id, submitted, preprint.current_step));
        }
        Ok(lines.join("\n"))
    }
}

//! Repository module for authors (bibliographic identities), accounts (login identities)
//! and the links between them and preprints.

use crate::models::request::{NewAccount, NewAuthor, NewPreprintAuthor};
use crate::models::response::{MergedLinks, MoveSummary};
use ::entity::account::ActiveModel as AccountActiveModel;
use ::entity::account::Entity as Account;
use ::entity::account::Model as AccountModel;
use ::entity::author::ActiveModel as AuthorActiveModel;
use ::entity::author::Entity as Author;
use ::entity::author::Model as AuthorModel;
use ::entity::preprint::Entity as Preprint;
use ::entity::preprint_author::ActiveModel as PreprintAuthorActiveModel;
use ::entity::preprint_author::Entity as PreprintAuthor;
use ::entity::preprint_author::Model as PreprintAuthorModel;
use async_trait::async_trait;
use chrono::Utc;
use entity::{account, author, preprint, preprint_author};
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A preprint's author link with the author and, when one exists, the account.
pub type AuthorEntry = (PreprintAuthorModel, AuthorModel, Option<AccountModel>);

#[derive(Debug, Clone, Default)]
pub struct DBPeopleRepo {
    pub db_session: DatabaseConnection,
}

#[async_trait]
pub trait PeopleRepo: Send + Sync {
    /// Authors are unique per email address.
    async fn get_or_create_author(&self, author: NewAuthor) -> Result<(AuthorModel, bool), DbErr>;

    /// Accounts are unique per email.
    async fn get_or_create_account(
        &self,
        account: NewAccount,
    ) -> Result<(AccountModel, bool), DbErr>;

    /// Author links are unique per (preprint, author).
    async fn get_or_create_preprint_author(
        &self,
        link: NewPreprintAuthor,
    ) -> Result<(PreprintAuthorModel, bool), DbErr>;

    /// Authors of a preprint in their listed order.
    async fn authors_for(&self, preprint_id: i32) -> Result<Vec<AuthorEntry>, DbErr>;

    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountModel>, DbErr>;

    async fn get_author_by_email(&self, email: &str) -> Result<Option<AuthorModel>, DbErr>;

    /// Moves preprint ownership and author links from one account to another, then
    /// deletes the source account. Runs in one transaction.
    async fn transfer_account(
        &self,
        from_account_id: i32,
        to_account_id: i32,
    ) -> Result<MoveSummary, DbErr>;

    async fn rename_author_email(&self, author_id: i32, email: &str)
        -> Result<AuthorModel, DbErr>;

    /// Saves `kept`, repoints the removed author's preprint links to it and deletes the
    /// removed author. Links to preprints the kept author is already on are deleted.
    async fn merge_authors(&self, kept: AuthorModel, removed_id: i32)
        -> Result<MergedLinks, DbErr>;

    /// Active accounts whose last name is shared with another active account.
    async fn accounts_sharing_last_name(&self) -> Result<Vec<AccountModel>, DbErr>;
}

#[async_trait]
impl PeopleRepo for DBPeopleRepo {
    async fn get_or_create_author(
        &self,
        new_author: NewAuthor,
    ) -> Result<(AuthorModel, bool), DbErr> {
        if let Some(existing) = self.get_author_by_email(&new_author.email_address).await? {
            return Ok((existing, false));
        }
        let author = AuthorActiveModel {
            id: Default::default(),
            email_address: ActiveValue::Set(new_author.email_address),
            first_name: ActiveValue::Set(new_author.first_name),
            middle_name: ActiveValue::Set(new_author.middle_name),
            last_name: ActiveValue::Set(new_author.last_name),
            orcid: ActiveValue::Set(new_author.orcid),
            affiliation: ActiveValue::Set(new_author.affiliation),
        };
        Ok((author.insert(&self.db_session).await?, true))
    }

    async fn get_or_create_account(
        &self,
        new_account: NewAccount,
    ) -> Result<(AccountModel, bool), DbErr> {
        if let Some(existing) = self.get_account_by_email(&new_account.email).await? {
            return Ok((existing, false));
        }
        let account = AccountActiveModel {
            id: Default::default(),
            username: ActiveValue::Set(new_account.email.to_lowercase()),
            email: ActiveValue::Set(new_account.email),
            password: ActiveValue::Set(new_account.password_hash),
            first_name: ActiveValue::Set(new_account.first_name),
            middle_name: ActiveValue::Set(new_account.middle_name),
            last_name: ActiveValue::Set(new_account.last_name),
            orcid: ActiveValue::Set(new_account.orcid),
            institution: ActiveValue::Set(new_account.institution),
            is_active: ActiveValue::Set(new_account.is_active),
            date_joined: ActiveValue::Set(Utc::now().naive_utc()),
            uuid: ActiveValue::Set(Uuid::new_v4()),
        };
        Ok((account.insert(&self.db_session).await?, true))
    }

    async fn get_or_create_preprint_author(
        &self,
        link: NewPreprintAuthor,
    ) -> Result<(PreprintAuthorModel, bool), DbErr> {
        let existing = PreprintAuthor::find()
            .filter(preprint_author::Column::PreprintId.eq(link.preprint_id))
            .filter(preprint_author::Column::AuthorId.eq(link.author_id))
            .one(&self.db_session)
            .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }
        let preprint_author = PreprintAuthorActiveModel {
            id: Default::default(),
            preprint_id: ActiveValue::Set(link.preprint_id),
            author_id: ActiveValue::Set(link.author_id),
            account_id: ActiveValue::Set(link.account_id),
            order: ActiveValue::Set(link.order),
            affiliation: ActiveValue::Set(link.affiliation),
        };
        Ok((preprint_author.insert(&self.db_session).await?, true))
    }

    async fn authors_for(&self, preprint_id: i32) -> Result<Vec<AuthorEntry>, DbErr> {
        let links = PreprintAuthor::find()
            .filter(preprint_author::Column::PreprintId.eq(preprint_id))
            .order_by_asc(preprint_author::Column::Order)
            .all(&self.db_session)
            .await?;
        let author_ids: Vec<i32> = links.iter().map(|link| link.author_id).collect();
        let account_ids: Vec<i32> = links.iter().filter_map(|link| link.account_id).collect();
        let mut authors: HashMap<i32, AuthorModel> = Author::find()
            .filter(author::Column::Id.is_in(author_ids))
            .all(&self.db_session)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect();
        let accounts: HashMap<i32, AccountModel> = Account::find()
            .filter(account::Column::Id.is_in(account_ids))
            .all(&self.db_session)
            .await?
            .into_iter()
            .map(|account| (account.id, account))
            .collect();
        Ok(links
            .into_iter()
            .filter_map(|link| {
                let author = authors.remove(&link.author_id)?;
                let account = link.account_id.and_then(|id| accounts.get(&id).cloned());
                Some((link, author, account))
            })
            .collect())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountModel>, DbErr> {
        Account::find()
            .filter(account::Column::Email.eq(email))
            .one(&self.db_session)
            .await
    }

    async fn get_author_by_email(&self, email: &str) -> Result<Option<AuthorModel>, DbErr> {
        Author::find()
            .filter(author::Column::EmailAddress.eq(email))
            .one(&self.db_session)
            .await
    }

    async fn transfer_account(
        &self,
        from_account_id: i32,
        to_account_id: i32,
    ) -> Result<MoveSummary, DbErr> {
        let txn = self.db_session.begin().await?;
        let owned = Preprint::update_many()
            .col_expr(preprint::Column::OwnerId, Expr::value(to_account_id))
            .filter(preprint::Column::OwnerId.eq(from_account_id))
            .exec(&txn)
            .await?;
        let links = PreprintAuthor::update_many()
            .col_expr(preprint_author::Column::AccountId, Expr::value(to_account_id))
            .filter(preprint_author::Column::AccountId.eq(from_account_id))
            .exec(&txn)
            .await?;
        Account::delete_by_id(from_account_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(MoveSummary {
            owned_preprints: owned.rows_affected,
            author_links: links.rows_affected,
        })
    }

    async fn rename_author_email(
        &self,
        author_id: i32,
        email: &str,
    ) -> Result<AuthorModel, DbErr> {
        let author = AuthorActiveModel {
            id: ActiveValue::Unchanged(author_id),
            email_address: ActiveValue::Set(email.to_string()),
            ..Default::default()
        };
        author.update(&self.db_session).await
    }

    async fn merge_authors(
        &self,
        kept: AuthorModel,
        removed_id: i32,
    ) -> Result<MergedLinks, DbErr> {
        let txn = self.db_session.begin().await?;
        let kept_id = kept.id;
        let kept_active: AuthorActiveModel = kept.into();
        kept_active.reset_all().update(&txn).await?;
        let already_linked: HashSet<i32> = PreprintAuthor::find()
            .filter(preprint_author::Column::AuthorId.eq(kept_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|link| link.preprint_id)
            .collect();
        let removed_links = PreprintAuthor::find()
            .filter(preprint_author::Column::AuthorId.eq(removed_id))
            .all(&txn)
            .await?;
        let mut links = MergedLinks::default();
        for link in removed_links {
            if already_linked.contains(&link.preprint_id) {
                PreprintAuthor::delete_by_id(link.id).exec(&txn).await?;
                links.dropped_duplicates += 1;
                continue;
            }
            let mut active: PreprintAuthorActiveModel = link.into();
            active.author_id = ActiveValue::Set(kept_id);
            active.update(&txn).await?;
            links.moved += 1;
        }
        Author::delete_by_id(removed_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(links)
    }

    async fn accounts_sharing_last_name(&self) -> Result<Vec<AccountModel>, DbErr> {
        let accounts = Account::find()
            .filter(account::Column::IsActive.eq(true))
            .filter(account::Column::LastName.is_not_null())
            .order_by_asc(account::Column::LastName)
            .order_by_asc(account::Column::FirstName)
            .all(&self.db_session)
            .await?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for account in &accounts {
            if let Some(last_name) = &account.last_name {
                *counts.entry(last_name.clone()).or_default() += 1;
            }
        }
        Ok(accounts
            .into_iter()
            .filter(|account| {
                account
                    .last_name
                    .as_ref()
                    .is_some_and(|last_name| counts.get(last_name).copied().unwrap_or(0) > 1)
            })
            .collect())
    }
}

//! Repository module for journals and their articles, read by the journal DOI commands.

use ::entity::article::Entity as Article;
use ::entity::article::Model as ArticleModel;
use ::entity::article_author::Entity as ArticleAuthor;
use ::entity::author::Entity as Author;
use ::entity::author::Model as AuthorModel;
use ::entity::journal::Entity as Journal;
use ::entity::journal::Model as JournalModel;
use async_trait::async_trait;
use entity::{article_author, author};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DBJournalsRepo {
    pub db_session: DatabaseConnection,
}

#[async_trait]
pub trait JournalsRepo: Send + Sync {
    async fn get_article(&self, article_id: i32) -> Result<Option<ArticleModel>, DbErr>;

    async fn get_journal(&self, journal_id: i32) -> Result<Option<JournalModel>, DbErr>;

    /// Authors of the article in byline order.
    async fn authors_for_article(&self, article_id: i32) -> Result<Vec<AuthorModel>, DbErr>;
}

#[async_trait]
impl JournalsRepo for DBJournalsRepo {
    async fn get_article(&self, article_id: i32) -> Result<Option<ArticleModel>, DbErr> {
        Article::find_by_id(article_id).one(&self.db_session).await
    }

    async fn get_journal(&self, journal_id: i32) -> Result<Option<JournalModel>, DbErr> {
        Journal::find_by_id(journal_id).one(&self.db_session).await
    }

    async fn authors_for_article(&self, article_id: i32) -> Result<Vec<AuthorModel>, DbErr> {
        let links = ArticleAuthor::find()
            .filter(article_author::Column::ArticleId.eq(article_id))
            .order_by_asc(article_author::Column::Order)
            .all(&self.db_session)
            .await?;
        let author_ids: Vec<i32> = links.iter().map(|link| link.author_id).collect();
        let mut authors: HashMap<i32, AuthorModel> = Author::find()
            .filter(author::Column::Id.is_in(author_ids))
            .all(&self.db_session)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect();
        Ok(links
            .into_iter()
            .filter_map(|link| authors.remove(&link.author_id))
            .collect())
    }
}

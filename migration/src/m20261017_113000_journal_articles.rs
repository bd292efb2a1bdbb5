use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Journal {
    Table,
    Id,
    Code,
    Name,
    Issn,
    CrossrefRegistrant,
}

#[derive(DeriveIden)]
enum Article {
    Table,
    Id,
    JournalId,
    Title,
    Abstract,
    Doi,
    RemoteUrl,
    DatePublished,
}

#[derive(DeriveIden)]
enum ArticleAuthor {
    Table,
    Id,
    ArticleId,
    AuthorId,
    Order,
}

#[derive(DeriveIden)]
enum Author {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Journal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Journal::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Journal::Code).string().not_null().unique_key())
                    .col(ColumnDef::new(Journal::Name).string().not_null())
                    .col(ColumnDef::new(Journal::Issn).string().null())
                    .col(ColumnDef::new(Journal::CrossrefRegistrant).string().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Article::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Article::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Article::JournalId).integer().not_null())
                    .col(ColumnDef::new(Article::Title).text().not_null())
                    .col(ColumnDef::new(Article::Abstract).text().null())
                    .col(ColumnDef::new(Article::Doi).string().null())
                    .col(ColumnDef::new(Article::RemoteUrl).string().null())
                    .col(ColumnDef::new(Article::DatePublished).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_journal")
                            .from(Article::Table, Article::JournalId)
                            .to(Journal::Table, Journal::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(ArticleAuthor::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ArticleAuthor::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ArticleAuthor::ArticleId).integer().not_null())
                    .col(ColumnDef::new(ArticleAuthor::AuthorId).integer().not_null())
                    .col(ColumnDef::new(ArticleAuthor::Order).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_author_article")
                            .from(ArticleAuthor::Table, ArticleAuthor::ArticleId)
                            .to(Article::Table, Article::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_author_author")
                            .from(ArticleAuthor::Table, ArticleAuthor::AuthorId)
                            .to(Author::Table, Author::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("uq_article_author")
                            .col(ArticleAuthor::ArticleId)
                            .col(ArticleAuthor::AuthorId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArticleAuthor::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Article::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Journal::Table).to_owned())
            .await?;
        Ok(())
    }
}

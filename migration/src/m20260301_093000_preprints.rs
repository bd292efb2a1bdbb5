use crate::m20260301_090000_repositories_and_people::{
    Account, Author, Keyword, Licence, Repository, RepositoryField, Subject,
};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Preprint {
    Table,
    Id,
    RepositoryId,
    OwnerId,
    LicenceId,
    SubmissionFileId,
    Title,
    Abstract,
    Stage,
    CurrentStep,
    CommentsEditor,
    PreprintDecisionNotification,
    Doi,
    PreprintDoi,
    SourceReference,
    DateStarted,
    DateSubmitted,
    DateAccepted,
    DatePublished,
    DateUpdated,
}

#[derive(DeriveIden)]
enum PreprintSubject {
    Table,
    PreprintId,
    SubjectId,
}

#[derive(DeriveIden)]
enum PreprintKeyword {
    Table,
    PreprintId,
    KeywordId,
}

#[derive(DeriveIden)]
enum PreprintAuthor {
    Table,
    Id,
    PreprintId,
    AuthorId,
    AccountId,
    Order,
    Affiliation,
}

#[derive(DeriveIden)]
enum PreprintFile {
    Table,
    Id,
    PreprintId,
    File,
    OriginalFilename,
    Uploaded,
    MimeType,
    Size,
}

#[derive(DeriveIden)]
enum PreprintVersion {
    Table,
    Id,
    PreprintId,
    FileId,
    Version,
    DateTime,
}

#[derive(DeriveIden)]
enum PreprintSupplementaryFile {
    Table,
    Id,
    PreprintId,
    Url,
    Label,
    Order,
}

#[derive(DeriveIden)]
enum RepositoryFieldAnswer {
    Table,
    Id,
    FieldId,
    PreprintId,
    Answer,
}

#[derive(DeriveIden)]
enum RepoEzidSettings {
    Table,
    Id,
    RepositoryId,
    EzidShoulder,
    EzidOwner,
}

#[derive(DeriveIden)]
enum WorkflowLog {
    Table,
    Id,
    PreprintId,
    ElementName,
    Timestamp,
}

fn preprint_fk<T: IntoIden + 'static>(
    name: &str,
    table: T,
    column: T,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(Preprint::Table, Preprint::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Preprint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Preprint::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Preprint::RepositoryId).integer().not_null())
                    .col(ColumnDef::new(Preprint::OwnerId).integer().null())
                    .col(ColumnDef::new(Preprint::LicenceId).integer().null())
                    .col(ColumnDef::new(Preprint::SubmissionFileId).integer().null())
                    .col(ColumnDef::new(Preprint::Title).text().not_null())
                    .col(ColumnDef::new(Preprint::Abstract).text().not_null())
                    .col(ColumnDef::new(Preprint::Stage).string().not_null())
                    .col(ColumnDef::new(Preprint::CurrentStep).integer().not_null())
                    .col(ColumnDef::new(Preprint::CommentsEditor).text().null())
                    .col(
                        ColumnDef::new(Preprint::PreprintDecisionNotification)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Preprint::Doi).string().null())
                    .col(ColumnDef::new(Preprint::PreprintDoi).string().null())
                    .col(ColumnDef::new(Preprint::SourceReference).string().null())
                    .col(ColumnDef::new(Preprint::DateStarted).timestamp().null())
                    .col(ColumnDef::new(Preprint::DateSubmitted).timestamp().null())
                    .col(ColumnDef::new(Preprint::DateAccepted).timestamp().null())
                    .col(ColumnDef::new(Preprint::DatePublished).timestamp().null())
                    .col(ColumnDef::new(Preprint::DateUpdated).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_repository")
                            .from(Preprint::Table, Preprint::RepositoryId)
                            .to(Repository::Table, Repository::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_licence")
                            .from(Preprint::Table, Preprint::LicenceId)
                            .to(Licence::Table, Licence::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_owner")
                            .from(Preprint::Table, Preprint::OwnerId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .index(
                        Index::create()
                            .name("uq_preprint_repository_preprint_doi")
                            .col(Preprint::RepositoryId)
                            .col(Preprint::PreprintDoi)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintSubject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintSubject::PreprintId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PreprintSubject::SubjectId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PreprintSubject::PreprintId)
                            .col(PreprintSubject::SubjectId),
                    )
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_subject_preprint",
                        PreprintSubject::Table,
                        PreprintSubject::PreprintId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_subject_subject")
                            .from(PreprintSubject::Table, PreprintSubject::SubjectId)
                            .to(Subject::Table, Subject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintKeyword::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintKeyword::PreprintId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PreprintKeyword::KeywordId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PreprintKeyword::PreprintId)
                            .col(PreprintKeyword::KeywordId),
                    )
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_keyword_preprint",
                        PreprintKeyword::Table,
                        PreprintKeyword::PreprintId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_keyword_keyword")
                            .from(PreprintKeyword::Table, PreprintKeyword::KeywordId)
                            .to(Keyword::Table, Keyword::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintAuthor::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintAuthor::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PreprintAuthor::PreprintId).integer().not_null())
                    .col(ColumnDef::new(PreprintAuthor::AuthorId).integer().not_null())
                    .col(ColumnDef::new(PreprintAuthor::AccountId).integer().null())
                    .col(ColumnDef::new(PreprintAuthor::Order).integer().not_null())
                    .col(ColumnDef::new(PreprintAuthor::Affiliation).string().null())
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_author_preprint",
                        PreprintAuthor::Table,
                        PreprintAuthor::PreprintId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_author_author")
                            .from(PreprintAuthor::Table, PreprintAuthor::AuthorId)
                            .to(Author::Table, Author::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_author_account")
                            .from(PreprintAuthor::Table, PreprintAuthor::AccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .index(
                        Index::create()
                            .name("uq_preprint_author")
                            .col(PreprintAuthor::PreprintId)
                            .col(PreprintAuthor::AuthorId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintFile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintFile::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PreprintFile::PreprintId).integer().not_null())
                    .col(ColumnDef::new(PreprintFile::File).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(PreprintFile::OriginalFilename)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PreprintFile::Uploaded).timestamp().not_null())
                    .col(ColumnDef::new(PreprintFile::MimeType).string().not_null())
                    .col(ColumnDef::new(PreprintFile::Size).big_integer().not_null())
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_file_preprint",
                        PreprintFile::Table,
                        PreprintFile::PreprintId,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintVersion::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PreprintVersion::PreprintId).integer().not_null())
                    .col(ColumnDef::new(PreprintVersion::FileId).integer().not_null())
                    .col(ColumnDef::new(PreprintVersion::Version).string().not_null())
                    .col(ColumnDef::new(PreprintVersion::DateTime).timestamp().not_null())
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_version_preprint",
                        PreprintVersion::Table,
                        PreprintVersion::PreprintId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_preprint_version_file")
                            .from(PreprintVersion::Table, PreprintVersion::FileId)
                            .to(PreprintFile::Table, PreprintFile::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(PreprintSupplementaryFile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PreprintSupplementaryFile::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PreprintSupplementaryFile::PreprintId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PreprintSupplementaryFile::Url).text().not_null())
                    .col(
                        ColumnDef::new(PreprintSupplementaryFile::Label)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PreprintSupplementaryFile::Order)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(&mut preprint_fk(
                        "fk_preprint_supplementary_file_preprint",
                        PreprintSupplementaryFile::Table,
                        PreprintSupplementaryFile::PreprintId,
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(RepositoryFieldAnswer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepositoryFieldAnswer::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RepositoryFieldAnswer::FieldId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryFieldAnswer::PreprintId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RepositoryFieldAnswer::Answer).text().not_null())
                    .foreign_key(&mut preprint_fk(
                        "fk_repository_field_answer_preprint",
                        RepositoryFieldAnswer::Table,
                        RepositoryFieldAnswer::PreprintId,
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repository_field_answer_field")
                            .from(RepositoryFieldAnswer::Table, RepositoryFieldAnswer::FieldId)
                            .to(RepositoryField::Table, RepositoryField::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("uq_repository_field_answer")
                            .col(RepositoryFieldAnswer::PreprintId)
                            .col(RepositoryFieldAnswer::FieldId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(RepoEzidSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepoEzidSettings::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RepoEzidSettings::RepositoryId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RepoEzidSettings::EzidShoulder)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepoEzidSettings::EzidOwner)
                            .string_len(50)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repo_ezid_settings_repository")
                            .from(RepoEzidSettings::Table, RepoEzidSettings::RepositoryId)
                            .to(Repository::Table, Repository::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(WorkflowLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowLog::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkflowLog::PreprintId).integer().not_null())
                    .col(ColumnDef::new(WorkflowLog::ElementName).string().not_null())
                    .col(ColumnDef::new(WorkflowLog::Timestamp).timestamp().not_null())
                    .foreign_key(&mut preprint_fk(
                        "fk_workflow_log_preprint",
                        WorkflowLog::Table,
                        WorkflowLog::PreprintId,
                    ))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepoEzidSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepositoryFieldAnswer::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(PreprintSupplementaryFile::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(PreprintVersion::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PreprintFile::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PreprintAuthor::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PreprintKeyword::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PreprintSubject::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Preprint::Table).to_owned())
            .await?;
        Ok(())
    }
}

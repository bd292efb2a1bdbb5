use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
pub(crate) enum Repository {
    Table,
    Id,
    PressId,
    Name,
    ShortName,
}

#[derive(DeriveIden)]
pub(crate) enum RepositoryField {
    Table,
    Id,
    RepositoryId,
    Name,
    InputType,
    Required,
    Order,
    Display,
}

#[derive(DeriveIden)]
pub(crate) enum Licence {
    Table,
    Id,
    PressId,
    Name,
    ShortName,
    Url,
    Text,
    Order,
}

#[derive(DeriveIden)]
pub(crate) enum Subject {
    Table,
    Id,
    RepositoryId,
    Name,
    Slug,
    ParentId,
}

#[derive(DeriveIden)]
pub(crate) enum Keyword {
    Table,
    Id,
    Word,
}

#[derive(DeriveIden)]
pub(crate) enum Author {
    Table,
    Id,
    EmailAddress,
    FirstName,
    MiddleName,
    LastName,
    Orcid,
    Affiliation,
}

#[derive(DeriveIden)]
pub(crate) enum Account {
    Table,
    Id,
    Email,
    Username,
    Password,
    FirstName,
    MiddleName,
    LastName,
    Orcid,
    Institution,
    IsActive,
    DateJoined,
    Uuid,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repository::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repository::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repository::PressId).integer().not_null())
                    .col(ColumnDef::new(Repository::Name).string().not_null())
                    .col(
                        ColumnDef::new(Repository::ShortName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(RepositoryField::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepositoryField::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RepositoryField::RepositoryId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RepositoryField::Name).string().not_null())
                    .col(
                        ColumnDef::new(RepositoryField::InputType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RepositoryField::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RepositoryField::Order).integer().not_null())
                    .col(
                        ColumnDef::new(RepositoryField::Display)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repository_field_repository")
                            .from(RepositoryField::Table, RepositoryField::RepositoryId)
                            .to(Repository::Table, Repository::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Licence::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Licence::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Licence::PressId).integer().not_null())
                    .col(ColumnDef::new(Licence::Name).string().not_null())
                    .col(ColumnDef::new(Licence::ShortName).string().not_null())
                    .col(ColumnDef::new(Licence::Url).string().not_null())
                    .col(ColumnDef::new(Licence::Text).text().not_null())
                    .col(ColumnDef::new(Licence::Order).integer().not_null())
                    .index(
                        Index::create()
                            .name("uq_licence_name_press")
                            .col(Licence::Name)
                            .col(Licence::PressId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Subject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subject::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subject::RepositoryId).integer().not_null())
                    .col(ColumnDef::new(Subject::Name).string().not_null())
                    .col(ColumnDef::new(Subject::Slug).string().not_null())
                    .col(ColumnDef::new(Subject::ParentId).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subject_parent")
                            .from(Subject::Table, Subject::ParentId)
                            .to(Subject::Table, Subject::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subject_repository")
                            .from(Subject::Table, Subject::RepositoryId)
                            .to(Repository::Table, Repository::Id),
                    )
                    .to_owned(),
            )
            .await?;
        // root subjects have a null parent, which a plain unique index treats as distinct
        let db = manager.get_connection();
        db.execute_unprepared(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS uq_subject_name_parent
            ON subject (repository_id, name, parent_id) NULLS NOT DISTINCT;
        "#,
        )
        .await?;
        manager
            .create_table(
                Table::create()
                    .table(Keyword::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Keyword::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Keyword::Word).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Author::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Author::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Author::EmailAddress)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Author::FirstName).string().null())
                    .col(ColumnDef::new(Author::MiddleName).string().null())
                    .col(ColumnDef::new(Author::LastName).string().null())
                    .col(ColumnDef::new(Author::Orcid).string().null())
                    .col(ColumnDef::new(Author::Affiliation).string().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::Id)
                            .integer()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Account::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Account::Username).string().not_null())
                    .col(ColumnDef::new(Account::Password).string().not_null())
                    .col(ColumnDef::new(Account::FirstName).string().null())
                    .col(ColumnDef::new(Account::MiddleName).string().null())
                    .col(ColumnDef::new(Account::LastName).string().null())
                    .col(ColumnDef::new(Account::Orcid).string().null())
                    .col(ColumnDef::new(Account::Institution).string().not_null())
                    .col(
                        ColumnDef::new(Account::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Account::DateJoined).timestamp().not_null())
                    .col(ColumnDef::new(Account::Uuid).uuid().not_null())
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Author::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Keyword::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subject::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Licence::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepositoryField::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repository::Table).to_owned())
            .await?;
        Ok(())
    }
}

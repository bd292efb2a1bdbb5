use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum RepoEzidSettings {
    Table,
    EzidUsername,
    EzidPassword,
    EzidEndpointUrl,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(RepoEzidSettings::Table)
                    .add_column(ColumnDef::new(RepoEzidSettings::EzidUsername).string().null())
                    .add_column(ColumnDef::new(RepoEzidSettings::EzidPassword).string().null())
                    .add_column(
                        ColumnDef::new(RepoEzidSettings::EzidEndpointUrl)
                            .string()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(RepoEzidSettings::Table)
                    .drop_column(RepoEzidSettings::EzidUsername)
                    .drop_column(RepoEzidSettings::EzidPassword)
                    .drop_column(RepoEzidSettings::EzidEndpointUrl)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

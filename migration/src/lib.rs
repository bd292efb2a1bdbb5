pub use sea_orm_migration::prelude::*;
mod m20260301_090000_repositories_and_people;
mod m20260301_093000_preprints;
mod m20261017_110000_repo_ezid_credentials;
mod m20261017_113000_journal_articles;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_090000_repositories_and_people::Migration),
            Box::new(m20260301_093000_preprints::Migration),
            Box::new(m20261017_110000_repo_ezid_credentials::Migration),
            Box::new(m20261017_113000_journal_articles::Migration),
        ]
    }
}

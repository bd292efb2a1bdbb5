pub use super::account::Entity as Account;
pub use super::article::Entity as Article;
pub use super::article_author::Entity as ArticleAuthor;
pub use super::author::Entity as Author;
pub use super::journal::Entity as Journal;
pub use super::keyword::Entity as Keyword;
pub use super::licence::Entity as Licence;
pub use super::preprint::Entity as Preprint;
pub use super::preprint_author::Entity as PreprintAuthor;
pub use super::preprint_file::Entity as PreprintFile;
pub use super::preprint_keyword::Entity as PreprintKeyword;
pub use super::preprint_subject::Entity as PreprintSubject;
pub use super::preprint_supplementary_file::Entity as PreprintSupplementaryFile;
pub use super::preprint_version::Entity as PreprintVersion;
pub use super::repo_ezid_settings::Entity as RepoEzidSettings;
pub use super::repository::Entity as Repository;
pub use super::repository_field::Entity as RepositoryField;
pub use super::repository_field_answer::Entity as RepositoryFieldAnswer;
pub use super::subject::Entity as Subject;
pub use super::workflow_log::Entity as WorkflowLog;

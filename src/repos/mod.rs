pub mod ezid_repo;
pub mod files_repo;
pub mod journals_repo;
pub mod osf_repo;
pub mod people_repo;
pub mod preprints_repo;
pub mod repositories_repo;
pub mod submissions_repo;

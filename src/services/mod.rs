pub mod accounts_service;
pub mod ezid_service;
pub mod osf_import_service;
pub mod plos_import_service;
pub mod upsert_service;

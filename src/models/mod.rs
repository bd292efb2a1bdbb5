pub mod common;
pub mod ezid;
pub mod osf;
pub mod records;
pub mod request;
pub mod response;

//! Source-specific mapping of raw documents onto [`crate::models::records`].

pub mod osf;
pub mod plos;

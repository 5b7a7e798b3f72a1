//! Tenant domain - restaurant lookup and owner access checks

pub mod directory;
pub mod models;

pub use directory::TenantDirectory;
pub use models::{AccessKey, Tenant};

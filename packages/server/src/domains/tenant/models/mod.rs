pub mod tenant;

pub use tenant::{owner_fields, AccessKey, Tenant, LEGACY_OWNER_FIELDS, OWNER_PRINCIPAL_FIELD};

//! Document-store collection paths.
//!
//! Tenants are stored under `Restaurants/{tenant_id}`; each tenant owns a
//! `Devices` and a `Sessions` sub-collection, plus `TableNumbers`, where
//! each allocated table number is claimed by a document whose id is the
//! number.

/// Top-level tenant collection
pub const TENANTS: &str = "Restaurants";

pub fn devices_collection(tenant_id: &str) -> String {
    format!("{}/{}/Devices", TENANTS, tenant_id)
}

pub fn sessions_collection(tenant_id: &str) -> String {
    format!("{}/{}/Sessions", TENANTS, tenant_id)
}

pub fn table_numbers_collection(tenant_id: &str) -> String {
    format!("{}/{}/TableNumbers", TENANTS, tenant_id)
}

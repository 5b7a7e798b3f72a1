//! Test fixtures for creating test data.
//!
//! Tenants are seeded with both an email-style and a principal-id owner
//! field so either flow can authenticate against them.

use anyhow::Result;
use device_auth_core::common::{sessions_collection, Role, TENANTS};
use device_auth_core::domains::auth::{AuthFlow, AuthorizationEngine, LoginRequest};
use device_auth_core::domains::device::{ClientFingerprint, DeviceFingerprint};
use device_auth_core::kernel::{
    BaseDocumentStore, Fields, MemoryDocumentStore, MockIdentityProvider, TestDependencies,
};
use serde_json::{json, Value};

pub const OWNER_EMAIL: &str = "owner@bistro.test";
pub const OWNER_PASSWORD: &str = "correct horse";
pub const OWNER_UID: &str = "uid-owner";

/// Tenant document owned by the test account
pub fn tenant_document(name: &str) -> Value {
    json!({
        "restaurantName": name,
        "email": OWNER_EMAIL,
        "userId": OWNER_UID,
    })
}

/// In-memory dependencies with the given tenants and the owner account
pub fn test_dependencies(tenant_ids: &[&str]) -> TestDependencies {
    test_dependencies_with(tenant_ids, MemoryDocumentStore::new())
}

/// Like `test_dependencies`, on top of a preconfigured store
pub fn test_dependencies_with(tenant_ids: &[&str], store: MemoryDocumentStore) -> TestDependencies {
    let store = tenant_ids.iter().fold(store, |store, id| {
        store.with_document(TENANTS, id, tenant_document(&format!("Bistro {}", id)))
    });
    TestDependencies::new()
        .mock_store(store)
        .mock_identity(MockIdentityProvider::new().with_account(
            OWNER_EMAIL,
            OWNER_PASSWORD,
            OWNER_UID,
        ))
}

pub fn engine(deps: &TestDependencies, flow: AuthFlow) -> AuthorizationEngine {
    AuthorizationEngine::new(deps.server_deps(), flow)
}

pub fn login_request(tenant_id: &str, role: Option<Role>) -> LoginRequest {
    LoginRequest {
        email: OWNER_EMAIL.to_string(),
        password: OWNER_PASSWORD.to_string(),
        tenant_id: tenant_id.to_string(),
        role,
    }
}

pub fn device(fingerprint: &str) -> ClientFingerprint {
    ClientFingerprint(DeviceFingerprint::new(fingerprint))
}

/// Write a tenant document through any store
pub async fn seed_tenant(store: &dyn BaseDocumentStore, tenant_id: &str) -> Result<()> {
    store
        .set(TENANTS, tenant_id, as_fields(tenant_document("Seeded Bistro")))
        .await
}

/// Write a Table session row directly, bypassing the ledger
pub async fn seed_table_session(
    store: &dyn BaseDocumentStore,
    tenant_id: &str,
    fingerprint: &str,
    table_number: u32,
    active: bool,
) -> Result<String> {
    store
        .add(
            &sessions_collection(tenant_id),
            as_fields(json!({
                "principalId": OWNER_UID,
                "deviceFingerprint": fingerprint,
                "role": "table",
                "tableNumber": table_number,
                "isActive": active,
                "loginTime": "2025-01-01T00:00:00Z",
                "lastActivity": "2025-01-01T00:00:00Z",
            })),
        )
        .await
}

pub fn as_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be a JSON object, got {}", other),
    }
}

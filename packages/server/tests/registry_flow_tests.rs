//! Engine-level tests for the registry (activation-gated) flow.

mod common;

use std::time::Duration;

use common::*;
use device_auth_core::common::{devices_collection, Role, TENANTS};
use device_auth_core::domains::auth::{AuthError, AuthFlow};
use device_auth_core::domains::device::{DeviceFingerprint, DeviceRegistry};
use device_auth_core::kernel::MemoryDocumentStore;
use serde_json::json;

#[tokio::test]
async fn test_unknown_device_is_registered_unactivated() {
    let deps = test_dependencies(&["7"]);

    let result = engine(&deps, AuthFlow::Registry)
        .login(&login_request("7", None), &device("FP-NEW"))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("New device registered. Please contact the restaurant owner to activate this device.")
    );

    let record = deps
        .store
        .document(&devices_collection("7"), "FP-NEW")
        .unwrap();
    assert_eq!(record.fields["activated"], json!(false));
    assert_eq!(record.fields["deviceRole"], json!(""));
    assert_eq!(deps.identity.open_sign_ins(OWNER_UID), 0);
}

#[tokio::test]
async fn test_registered_device_waits_for_activation() {
    let deps = test_dependencies(&["7"]);
    let engine = engine(&deps, AuthFlow::Registry);

    engine
        .authorize(&login_request("7", None), &device("FP-1"))
        .await
        .unwrap_err();
    let err = engine
        .authorize(&login_request("7", None), &device("FP-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::DeviceNotActivated { .. }));
    assert_eq!(deps.store.documents(&devices_collection("7")).len(), 1);
}

#[tokio::test]
async fn test_activated_device_logs_in_with_its_role() {
    let deps = test_dependencies(&["7"]);
    let engine = engine(&deps, AuthFlow::Registry);
    let fp = DeviceFingerprint::new("FP-T");

    engine
        .authorize(&login_request("7", None), &device("FP-T"))
        .await
        .unwrap_err();
    DeviceRegistry::new(deps.store.clone())
        .activate("7", &fp, Role::Table, Some("3"))
        .await
        .unwrap();

    // The requested role is ignored; the record decides
    let authorized = engine
        .authorize(&login_request("7", Some(Role::Owner)), &device("FP-T"))
        .await
        .unwrap();

    assert_eq!(authorized.role, Role::Table);
    assert_eq!(authorized.table_number, Some(3));
    assert_eq!(authorized.principal_id, OWNER_UID);
    assert!(authorized.session_id.is_none());

    let record = deps.store.document(&devices_collection("7"), "FP-T").unwrap();
    assert!(record.fields.contains_key("lastLogin"));
}

#[tokio::test]
async fn test_device_bound_elsewhere_is_refused_before_sign_in() {
    let store = MemoryDocumentStore::new().with_document(
        &devices_collection("2"),
        "FP-1",
        json!({"deviceId": "FP-1", "deviceRole": "staff", "activated": true, "tableNumber": ""}),
    );
    let deps = test_dependencies_with(&["2", "7"], store);

    let result = engine(&deps, AuthFlow::Registry)
        .login(&login_request("7", None), &device("FP-1"))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("This device is already assigned to another restaurant. Please use a different device or contact the restaurant owner to reassign this device.")
    );
    assert_eq!(deps.identity.sign_in_calls(), 0);
    assert!(deps.store.document(&devices_collection("7"), "FP-1").is_none());
}

#[tokio::test]
async fn test_device_bound_to_requested_tenant_proceeds() {
    let store = MemoryDocumentStore::new().with_document(
        &devices_collection("7"),
        "FP-1",
        json!({"deviceId": "FP-1", "deviceRole": "Staff", "activated": true, "tableNumber": ""}),
    );
    let deps = test_dependencies_with(&["2", "7"], store);

    let authorized = engine(&deps, AuthFlow::Registry)
        .authorize(&login_request("7", None), &device("FP-1"))
        .await
        .unwrap();

    assert_eq!(authorized.role, Role::Staff);
    assert_eq!(authorized.table_number, None);
}

#[tokio::test]
async fn test_unreadable_binding_is_not_treated_as_unbound() {
    let store = MemoryDocumentStore::new().with_document(
        &devices_collection("2"),
        "FP-X",
        json!({"deviceId": "FP-X", "deviceRole": "staff", "activated": "true"}),
    );
    let deps = test_dependencies_with(&["2", "7"], store);

    let result = engine(&deps, AuthFlow::Registry)
        .login(&login_request("7", None), &device("FP-X"))
        .await;

    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(deps.identity.sign_in_calls(), 0);
    assert!(deps.store.document(&devices_collection("7"), "FP-X").is_none());
}

#[tokio::test]
async fn test_scan_timeout_proceeds_as_unbound() {
    let store = MemoryDocumentStore::new()
        .with_slow_collection("/Devices", Duration::from_millis(200))
        .with_document(
            &devices_collection("2"),
            "FP-1",
            json!({"deviceId": "FP-1", "deviceRole": "staff", "activated": true, "tableNumber": ""}),
        );
    let deps = test_dependencies_with(&["2", "7"], store).scan_timeout(Duration::from_millis(20));

    let err = engine(&deps, AuthFlow::Registry)
        .authorize(&login_request("7", None), &device("FP-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::DeviceRegistered { .. }));
    assert_eq!(deps.identity.sign_in_calls(), 1);
}

#[tokio::test]
async fn test_email_access_is_case_insensitive() {
    let store = MemoryDocumentStore::new().with_document(
        TENANTS,
        "42",
        json!({"restaurantName": "Forty-Two", "email": "a@b.com"}),
    );
    let deps = test_dependencies_with(&[], store).mock_identity(
        device_auth_core::kernel::MockIdentityProvider::new().with_account("a@b.com", "pw", "uid-42"),
    );
    let mut request = login_request("42", None);
    request.email = "A@B.com".to_string();
    request.password = "pw".to_string();

    let err = engine(&deps, AuthFlow::Registry)
        .authorize(&request, &device("FP-42"))
        .await
        .unwrap_err();

    // Access passed; the device is merely new
    assert!(matches!(err, AuthError::DeviceRegistered { .. }));
}

#[tokio::test]
async fn test_no_access_leaves_no_trace() {
    let store = MemoryDocumentStore::new().with_document(
        TENANTS,
        "8",
        json!({"restaurantName": "Someone Else", "email": "other@bistro.test"}),
    );
    let deps = test_dependencies_with(&[], store);

    let result = engine(&deps, AuthFlow::Registry)
        .login(&login_request("8", None), &device("FP-1"))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("You don't have access to this restaurant. Please check your credentials or contact the restaurant owner.")
    );
    assert!(deps.store.documents(&devices_collection("8")).is_empty());
    assert_eq!(deps.identity.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_missing_tenant_looks_like_no_access() {
    let deps = test_dependencies(&["7"]);

    let err = engine(&deps, AuthFlow::Registry)
        .authorize(&login_request("404", None), &device("FP-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NoAccess { .. }));
}

#[tokio::test]
async fn test_identity_outage_is_retryable() {
    let deps = test_dependencies(&["7"]);
    deps.identity.set_offline(true);

    let result = engine(&deps, AuthFlow::Registry)
        .login(&login_request("7", None), &device("FP-1"))
        .await;

    assert!(!result.success);
    assert!(result.retryable);
    assert!(deps.store.documents(&devices_collection("7")).is_empty());
}

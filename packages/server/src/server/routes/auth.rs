//! Login and logout endpoints for device clients.
//!
//! The device fingerprint is reported by the client; the server has no way
//! to derive it.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::common::Role;
use crate::domains::auth::{AuthError, AuthorizationResult, ErrorKind, LoginRequest};
use crate::domains::device::{ClientFingerprint, DeviceFingerprint};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    pub email: String,
    pub password: String,
    pub tenant_id: String,
    #[serde(default)]
    pub role: Option<String>,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutBody {
    pub tenant_id: String,
    pub device_id: String,
    /// Token returned by the login that opened the session
    #[serde(default)]
    pub session_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub async fn login_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<LoginBody>,
) -> (StatusCode, Json<AuthorizationResult>) {
    let fingerprint = DeviceFingerprint::new(body.device_id.trim());
    if fingerprint.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthorizationResult {
                success: false,
                role: None,
                tenant_id: None,
                table_number: None,
                principal_id: None,
                session_token: None,
                error_message: Some("Missing device identifier.".to_string()),
                retryable: false,
            }),
        );
    }

    let role = match body.role.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                let e = AuthError::UnsupportedRole(raw.to_string());
                return (status_for(&e), Json((&e).into()));
            }
        },
    };

    let request = LoginRequest {
        email: body.email,
        password: body.password,
        tenant_id: body.tenant_id,
        role,
    };

    match state
        .engine
        .authorize(&request, &ClientFingerprint(fingerprint))
        .await
    {
        Ok(authorized) => (StatusCode::OK, Json((&authorized).into())),
        Err(e) => (status_for(&e), Json((&e).into())),
    }
}

pub async fn logout_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<LogoutBody>,
) -> (StatusCode, Json<LogoutResponse>) {
    let fingerprint = DeviceFingerprint::new(body.device_id.trim());

    match state
        .engine
        .logout(&body.tenant_id, &fingerprint, &body.session_token)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(LogoutResponse {
                success: true,
                error_message: None,
            }),
        ),
        Err(e @ AuthError::InvalidSessionToken) => (
            status_for(&e),
            Json(LogoutResponse {
                success: false,
                error_message: Some(e.user_message()),
            }),
        ),
        Err(e) => {
            error!(error = %e, tenant_id = %body.tenant_id, "Logout failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(LogoutResponse {
                    success: false,
                    error_message: Some(
                        "Unable to sign out right now. Please try again.".to_string(),
                    ),
                }),
            )
        }
    }
}

fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidCredentials(_) | AuthError::InvalidSessionToken => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::NoAccess { .. } => StatusCode::FORBIDDEN,
        AuthError::RoleRequired | AuthError::UnsupportedRole(_) => StatusCode::BAD_REQUEST,
        e => match e.kind() {
            ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DeviceState => StatusCode::CONFLICT,
            ErrorKind::Access => StatusCode::FORBIDDEN,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{sessions_collection, TENANTS};
    use crate::domains::auth::{AuthFlow, AuthorizationEngine};
    use crate::kernel::{MemoryDocumentStore, MockIdentityProvider, TestDependencies};
    use serde_json::json;

    fn state(flow: AuthFlow) -> (TestDependencies, AppState) {
        let deps = TestDependencies::new()
            .mock_store(MemoryDocumentStore::new().with_document(
                TENANTS,
                "7",
                json!({"restaurantName": "Seven", "email": "owner@seven.com", "userId": "uid-7"}),
            ))
            .mock_identity(MockIdentityProvider::new().with_account(
                "owner@seven.com",
                "secret",
                "uid-7",
            ));
        let state = AppState {
            engine: AuthorizationEngine::new(deps.server_deps(), flow),
        };
        (deps, state)
    }

    fn login(role: Option<&str>, password: &str, device: &str) -> Json<LoginBody> {
        Json(LoginBody {
            email: "owner@seven.com".into(),
            password: password.into(),
            tenant_id: "7".into(),
            role: role.map(str::to_string),
            device_id: device.into(),
        })
    }

    #[tokio::test]
    async fn test_login_success_and_conflict_statuses() {
        let (_, state) = state(AuthFlow::Session);

        let (status, Json(result)) =
            login_handler(Extension(state.clone()), login(Some("table"), "secret", "FP-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(result.success);
        assert_eq!(result.table_number, Some(1));

        let (status, Json(result)) =
            login_handler(Extension(state), login(Some("staff"), "secret", "FP-1")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!result.success);
        assert!(!result.retryable);
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let (_, state) = state(AuthFlow::Session);

        let (status, _) =
            login_handler(Extension(state.clone()), login(Some("staff"), "wrong", "FP-1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            login_handler(Extension(state.clone()), login(Some("chef"), "secret", "FP-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            login_handler(Extension(state.clone()), login(None, "secret", "FP-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = login_handler(Extension(state), login(Some("staff"), "secret", " ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transport_failure_is_503_and_retryable() {
        let (deps, state) = state(AuthFlow::Session);
        deps.store.set_offline(true);

        let (status, Json(result)) =
            login_handler(Extension(state), login(Some("staff"), "secret", "FP-1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(result.retryable);
    }

    fn logout(device: &str, token: &str) -> Json<LogoutBody> {
        Json(LogoutBody {
            tenant_id: "7".into(),
            device_id: device.into(),
            session_token: token.into(),
        })
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (deps, state) = state(AuthFlow::Session);
        let (_, Json(result)) =
            login_handler(Extension(state.clone()), login(Some("staff"), "secret", "FP-1")).await;
        let token = result.session_token.unwrap();

        for _ in 0..2 {
            let (status, Json(response)) =
                logout_handler(Extension(state.clone()), logout("FP-1", &token)).await;
            assert_eq!(status, StatusCode::OK);
            assert!(response.success);
        }
        assert_eq!(deps.identity.sign_out_calls(), 2);
    }

    #[tokio::test]
    async fn test_logout_requires_the_issued_token() {
        let (deps, state) = state(AuthFlow::Session);
        let (_, Json(result)) =
            login_handler(Extension(state.clone()), login(Some("staff"), "secret", "FP-1")).await;
        let token = result.session_token.unwrap();

        for (device, token) in [("FP-1", ""), ("FP-1", "guessed"), ("FP-2", token.as_str())] {
            let (status, Json(response)) =
                logout_handler(Extension(state.clone()), logout(device, token)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(!response.success);
        }
        assert_eq!(deps.identity.sign_out_calls(), 0);

        let session = &deps.store.documents(&sessions_collection("7"))[0];
        assert_eq!(session.fields["isActive"], json!(true));
    }

    #[tokio::test]
    async fn test_registry_flow_new_device_is_conflict() {
        let (_, state) = state(AuthFlow::Registry);
        let (status, Json(result)) =
            login_handler(Extension(state), login(None, "secret", "FP-NEW")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            result.error_message.as_deref(),
            Some("New device registered. Please contact the restaurant owner to activate this device.")
        );
    }
}

//! Registry flow: device records gated by explicit activation

use tracing::{info, warn};

use crate::common::Role;
use crate::domains::auth::errors::AuthError;
use crate::domains::auth::types::{Authorized, LoginRequest};
use crate::domains::device::{
    CrossTenantScanner, DeviceFingerprint, DeviceIdentity, DeviceRegistry, DeviceState,
    LoginDecision,
};
use crate::domains::tenant::{AccessKey, TenantDirectory};
use crate::kernel::{IdentitySession, ServerDeps};

use super::sign_out_on_failure;

/// Authorize a device whose role was assigned by an administrator.
///
/// A device seen for the first time is registered as unactivated and the
/// attempt fails until an owner activates it. A device already known to a
/// different tenant is refused before any credential is checked.
pub async fn authorize_registry(
    request: &LoginRequest,
    device: &dyn DeviceIdentity,
    deps: &ServerDeps,
) -> Result<Authorized, AuthError> {
    let fingerprint = device.current_fingerprint();

    let scanner = CrossTenantScanner::new(deps.store.clone(), deps.scan_timeout);
    if let Some(binding) = scanner.scan_all_tenants_for(&fingerprint).await? {
        if binding.tenant_id != request.tenant_id {
            warn!(
                device = %fingerprint,
                requested_tenant = %request.tenant_id,
                bound_tenant = %binding.tenant_id,
                "Device already assigned to another tenant"
            );
            return Err(AuthError::DeviceBoundElsewhere {
                bound_tenant_id: binding.tenant_id,
            });
        }
    }

    let mut identity = IdentitySession::new(deps.identity.clone());
    let principal = identity.sign_in(&request.email, &request.password).await?;
    info!(principal_id = %principal.id, tenant_id = %request.tenant_id, "Credentials verified");

    let outcome = admit_device(request, &principal.id, &fingerprint, deps).await;
    sign_out_on_failure(outcome, &mut identity).await
}

async fn admit_device(
    request: &LoginRequest,
    principal_id: &str,
    fingerprint: &DeviceFingerprint,
    deps: &ServerDeps,
) -> Result<Authorized, AuthError> {
    let tenant_id = request.tenant_id.as_str();

    let directory = TenantDirectory::new(deps.store.clone());
    if !directory
        .verify_access(tenant_id, AccessKey::Email(&request.email))
        .await?
    {
        return Err(AuthError::NoAccess {
            tenant_id: tenant_id.to_string(),
        });
    }

    let registry = DeviceRegistry::new(deps.store.clone());
    let record = registry.exists(tenant_id, fingerprint).await?;

    match DeviceState::of(record.as_ref()).decide() {
        LoginDecision::Register => {
            registry
                .create(tenant_id, fingerprint)
                .await
                .map_err(AuthError::RegistrationFailed)?;
            Err(AuthError::DeviceRegistered {
                tenant_id: tenant_id.to_string(),
            })
        }
        LoginDecision::AwaitActivation => {
            info!(tenant_id = %tenant_id, device = %fingerprint, "Device not activated");
            Err(AuthError::DeviceNotActivated {
                tenant_id: tenant_id.to_string(),
            })
        }
        LoginDecision::Allow(role) => {
            registry.touch_last_login(tenant_id, fingerprint).await;

            let table_number = match role {
                Role::Table => record.as_ref().and_then(|r| r.table_number_value()),
                _ => None,
            };
            info!(
                tenant_id = %tenant_id,
                device = %fingerprint,
                role = %role,
                table_number = ?table_number,
                "Device authorized"
            );
            Ok(Authorized {
                tenant_id: tenant_id.to_string(),
                principal_id: principal_id.to_string(),
                role,
                table_number,
                session_id: None,
                session_token: None,
            })
        }
    }
}

//! Session flow: first-use role selection with a role lock

use tracing::info;

use crate::common::Role;
use crate::domains::auth::errors::AuthError;
use crate::domains::auth::types::{Authorized, LoginRequest};
use crate::domains::device::DeviceIdentity;
use crate::domains::session::{OpenedSession, SessionLedger};
use crate::domains::tenant::{AccessKey, TenantDirectory};
use crate::kernel::{IdentitySession, Principal, ServerDeps};

use super::sign_out_on_failure;

/// Authorize a device in the role the user picked.
///
/// The first successful login of a device in a tenant fixes its role (and,
/// for tables, its number). Later logins must ask for the same role.
pub async fn authorize_session(
    request: &LoginRequest,
    device: &dyn DeviceIdentity,
    deps: &ServerDeps,
) -> Result<Authorized, AuthError> {
    let role = match request.role {
        None => return Err(AuthError::RoleRequired),
        Some(role) if !role.is_bindable() => {
            return Err(AuthError::UnsupportedRole(role.to_string()))
        }
        Some(role) => role,
    };

    let mut identity = IdentitySession::new(deps.identity.clone());
    let principal = identity.sign_in(&request.email, &request.password).await?;
    info!(principal_id = %principal.id, tenant_id = %request.tenant_id, "Credentials verified");

    let outcome = open_session(request, role, &principal, device, deps).await;
    sign_out_on_failure(outcome, &mut identity).await
}

async fn open_session(
    request: &LoginRequest,
    role: Role,
    principal: &Principal,
    device: &dyn DeviceIdentity,
    deps: &ServerDeps,
) -> Result<Authorized, AuthError> {
    let tenant_id = request.tenant_id.as_str();

    let directory = TenantDirectory::new(deps.store.clone());
    if !directory
        .verify_access(tenant_id, AccessKey::PrincipalId(&principal.id))
        .await?
    {
        return Err(AuthError::NoAccess {
            tenant_id: tenant_id.to_string(),
        });
    }

    let fingerprint = device.current_fingerprint();
    let ledger = SessionLedger::new(deps.store.clone());
    let OpenedSession { session, token } = ledger
        .open_or_reuse(tenant_id, &principal.id, &fingerprint, role)
        .await?;

    Ok(Authorized {
        tenant_id: tenant_id.to_string(),
        principal_id: principal.id.clone(),
        role: session.role,
        table_number: session.table(),
        session_id: Some(session.id),
        session_token: Some(token.into_string()),
    })
}

//! Logout: prove the session, close it, then sign out of the identity provider

use anyhow::Context;
use tracing::{info, warn};

use crate::domains::auth::errors::AuthError;
use crate::domains::device::DeviceFingerprint;
use crate::domains::session::SessionLedger;
use crate::kernel::ServerDeps;

/// Close the device's session in the tenant and sign its principal out.
///
/// `token` must be the session token issued at the device's latest login;
/// anything else is refused without touching the session. Idempotent: a
/// second logout with the same token closes nothing and succeeds.
pub async fn logout(
    tenant_id: &str,
    fingerprint: &DeviceFingerprint,
    token: &str,
    deps: &ServerDeps,
) -> Result<(), AuthError> {
    let ledger = SessionLedger::new(deps.store.clone());
    let session = match ledger
        .authenticate(tenant_id, fingerprint, token)
        .await
        .context("Failed to look up session")?
    {
        Some(session) => session,
        None => {
            warn!(tenant_id = %tenant_id, device = %fingerprint, "Logout with unknown session token");
            return Err(AuthError::InvalidSessionToken);
        }
    };

    let closed = ledger
        .close(tenant_id, &session.principal_id, fingerprint)
        .await
        .context("Failed to close session")?;

    deps.identity
        .sign_out(&session.principal_id)
        .await
        .context("Failed to sign out")?;

    info!(
        tenant_id = %tenant_id,
        principal_id = %session.principal_id,
        device = %fingerprint,
        closed = closed,
        "Logged out"
    );
    Ok(())
}

//! AuthorizationEngine - the single entry point for login and logout
//!
//! Runs exactly one of the two flows, chosen at construction. The flows are
//! never mixed within an engine: the registry flow needs an administrator to
//! activate devices, the session flow does not.

use tracing::{error, info, instrument};

use crate::domains::device::{DeviceFingerprint, DeviceIdentity};
use crate::kernel::ServerDeps;

use super::actions;
use super::errors::{AuthError, ErrorKind};
use super::types::{AuthFlow, AuthorizationResult, Authorized, LoginRequest};

#[derive(Clone)]
pub struct AuthorizationEngine {
    deps: ServerDeps,
    flow: AuthFlow,
}

impl AuthorizationEngine {
    pub fn new(deps: ServerDeps, flow: AuthFlow) -> Self {
        Self { deps, flow }
    }

    pub fn flow(&self) -> AuthFlow {
        self.flow
    }

    pub fn deps(&self) -> &ServerDeps {
        &self.deps
    }

    /// Run one authorization attempt for the device behind `device`
    #[instrument(skip_all, fields(flow = %self.flow, tenant_id = %request.tenant_id))]
    pub async fn authorize(
        &self,
        request: &LoginRequest,
        device: &dyn DeviceIdentity,
    ) -> Result<Authorized, AuthError> {
        let outcome = match self.flow {
            AuthFlow::Registry => actions::authorize_registry(request, device, &self.deps).await,
            AuthFlow::Session => actions::authorize_session(request, device, &self.deps).await,
        };

        match &outcome {
            Ok(authorized) => info!(
                role = %authorized.role,
                table_number = ?authorized.table_number,
                "Authorization succeeded"
            ),
            Err(e) if e.kind() == ErrorKind::Transport => {
                error!(error = %e, "Authorization failed: backend unavailable")
            }
            Err(e) => info!(reason = %e, "Authorization refused"),
        }
        outcome
    }

    /// `authorize`, flattened into the result type the presentation layer renders
    pub async fn login(
        &self,
        request: &LoginRequest,
        device: &dyn DeviceIdentity,
    ) -> AuthorizationResult {
        (&self.authorize(request, device).await).into()
    }

    /// Close the device's session and sign out. `session_token` is the token
    /// returned by the login that opened the session. Safe to call repeatedly.
    ///
    /// The registry flow keeps no server-side session, so there is nothing
    /// to close and the call succeeds without touching the store.
    #[instrument(skip_all, fields(flow = %self.flow, tenant_id = %tenant_id))]
    pub async fn logout(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
        session_token: &str,
    ) -> Result<(), AuthError> {
        match self.flow {
            AuthFlow::Registry => Ok(()),
            AuthFlow::Session => {
                actions::logout(tenant_id, fingerprint, session_token, &self.deps).await
            }
        }
    }
}

//! Auth domain actions - one async function per flow
//!
//! Each action is a linear sequence of awaited steps; the first failing step
//! ends the attempt. Every attempt signs in through its own
//! `IdentitySession`. Once the principal has been signed in, any later
//! failure signs that session out again so a failed attempt never leaves an
//! authenticated provider session behind.

mod authorize_registry;
mod authorize_session;
mod logout;

pub use authorize_registry::authorize_registry;
pub use authorize_session::authorize_session;
pub use logout::logout;

use tracing::warn;

use crate::kernel::IdentitySession;

use super::errors::AuthError;

/// Sign the attempt's principal out again if the rest of the attempt failed
async fn sign_out_on_failure<T>(
    outcome: Result<T, AuthError>,
    identity: &mut IdentitySession,
) -> Result<T, AuthError> {
    if outcome.is_err() {
        if let Err(e) = identity.sign_out().await {
            warn!(error = %e, "Sign-out after failed authorization did not complete");
        }
    }
    outcome
}

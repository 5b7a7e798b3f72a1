//! Per-attempt sign-in state over a shared identity provider.
//!
//! Each authorization attempt owns one `IdentitySession`. Signing out after
//! a failure therefore only ends that attempt's sign-in, never another
//! request's.

use std::sync::Arc;

use anyhow::Result;

use super::traits::{BaseIdentityProvider, IdentityError, Principal};

pub struct IdentitySession {
    provider: Arc<dyn BaseIdentityProvider>,
    principal: Option<Principal>,
}

impl IdentitySession {
    pub fn new(provider: Arc<dyn BaseIdentityProvider>) -> Self {
        Self {
            provider,
            principal: None,
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        let principal = self.provider.sign_in(email, password).await?;
        self.principal = Some(principal.clone());
        Ok(principal)
    }

    /// Sign out whoever this session signed in. No-op when nobody is.
    pub async fn sign_out(&mut self) -> Result<()> {
        let Some(principal) = &self.principal else {
            return Ok(());
        };
        self.provider.sign_out(&principal.id).await?;
        self.principal = None;
        Ok(())
    }

    pub fn current_principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }
}

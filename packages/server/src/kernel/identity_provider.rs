//! REST client for the email/password identity provider.
//!
//! Speaks the identity-toolkit password sign-in protocol:
//! `POST {base}/v1/accounts:signInWithPassword?key={api_key}`.
//! A 4xx answer carrying `error.message` is a credential rejection; anything
//! else that is not a 2xx is treated as a transport failure.
//!
//! The client is stateless and shared by every request. Password sign-in
//! leaves nothing on the provider side to revoke, so sign-out is only logged.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{BaseIdentityProvider, IdentityError, Principal};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity provider adapter over HTTP
pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn sign_in_url(&self) -> String {
        format!(
            "{}/v1/accounts:signInWithPassword?key={}",
            self.base_url, self.api_key
        )
    }
}

/// Map the provider's error codes onto the messages shown to users.
fn rejection_message(code: &str) -> String {
    // Codes may carry a suffix: "TOO_MANY_ATTEMPTS_TRY_LATER : ..."
    let code = code.split(':').next().unwrap_or(code).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "The email or password is incorrect.".to_string()
        }
        "USER_DISABLED" => "This account has been disabled.".to_string(),
        "INVALID_EMAIL" => "The email address is badly formatted.".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Too many sign-in attempts. Please try again later.".to_string()
        }
        other => format!("Authentication failed ({})", other),
    }
}

#[async_trait]
impl BaseIdentityProvider for RestIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        let response = self
            .client
            .post(self.sign_in_url())
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .context("Failed to reach identity provider")?;

        let status = response.status();
        if status.is_success() {
            let body: SignInResponse = response
                .json()
                .await
                .context("Malformed sign-in response")?;
            let principal = Principal {
                id: body.local_id,
                email: body.email.unwrap_or_else(|| email.to_string()),
            };
            debug!(principal_id = %principal.id, "Identity provider sign-in succeeded");
            return Ok(principal);
        }

        if status.is_client_error() {
            if let Ok(envelope) = response.json::<ErrorEnvelope>().await {
                warn!(code = %envelope.error.message, "Identity provider rejected sign-in");
                return Err(IdentityError::Rejected(rejection_message(
                    &envelope.error.message,
                )));
            }
        }

        Err(IdentityError::Transport(anyhow!(
            "identity provider returned HTTP {}",
            status
        )))
    }

    async fn sign_out(&self, principal_id: &str) -> Result<()> {
        debug!(principal_id = %principal_id, "Identity provider sign-out");
        Ok(())
    }
}

//! Auth domain data types
//!
//! Inputs and outputs of an authorization attempt, serialized the way the
//! presentation layer expects them (camelCase).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::Role;

use super::errors::AuthError;

/// Which authorization protocol the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFlow {
    /// Device records gated by explicit activation (Flow A)
    Registry,
    /// First-use role selection with a role lock (Flow B)
    #[default]
    Session,
}

impl FromStr for AuthFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(AuthFlow::Registry),
            "session" => Ok(AuthFlow::Session),
            other => Err(format!(
                "unknown auth flow '{}' (expected 'registry' or 'session')",
                other
            )),
        }
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFlow::Registry => f.write_str("registry"),
            AuthFlow::Session => f.write_str("session"),
        }
    }
}

/// One login attempt. The device fingerprint is supplied separately.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub tenant_id: String,
    /// Requested role; required by the session flow, ignored by the registry flow
    #[serde(default)]
    pub role: Option<Role>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("role", &self.role)
            .finish()
    }
}

/// A successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub tenant_id: String,
    pub principal_id: String,
    pub role: Role,
    pub table_number: Option<u32>,
    /// Session row id (session flow only)
    pub session_id: Option<String>,
    /// Token the device presents to log out (session flow only)
    pub session_token: Option<String>,
}

/// The single result type handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

impl From<&Authorized> for AuthorizationResult {
    fn from(authorized: &Authorized) -> Self {
        Self {
            success: true,
            role: Some(authorized.role),
            tenant_id: Some(authorized.tenant_id.clone()),
            table_number: authorized.table_number,
            principal_id: Some(authorized.principal_id.clone()),
            session_token: authorized.session_token.clone(),
            error_message: None,
            retryable: false,
        }
    }
}

impl From<&AuthError> for AuthorizationResult {
    fn from(error: &AuthError) -> Self {
        Self {
            success: false,
            role: None,
            tenant_id: None,
            table_number: None,
            principal_id: None,
            session_token: None,
            error_message: Some(error.user_message()),
            retryable: error.is_retryable(),
        }
    }
}

impl From<&Result<Authorized, AuthError>> for AuthorizationResult {
    fn from(outcome: &Result<Authorized, AuthError>) -> Self {
        match outcome {
            Ok(authorized) => authorized.into(),
            Err(error) => error.into(),
        }
    }
}

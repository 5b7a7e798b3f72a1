//! Authorization failures and how they are presented

use thiserror::Error;

use crate::domains::session::{LedgerError, RoleConflict};
use crate::kernel::IdentityError;

/// Broad class of a failure, deciding whether the user should retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Store or identity provider unreachable; retrying may succeed
    Transport,
    /// Bad credentials or no access to the tenant; the user must correct input
    Access,
    /// The device is in a state that needs administrative action
    DeviceState,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("backend unavailable: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error("credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("principal has no access to tenant {tenant_id}")]
    NoAccess { tenant_id: String },

    #[error("device is bound to tenant {bound_tenant_id}")]
    DeviceBoundElsewhere { bound_tenant_id: String },

    #[error("device registered in tenant {tenant_id}, awaiting activation")]
    DeviceRegistered { tenant_id: String },

    #[error("device is not activated in tenant {tenant_id}")]
    DeviceNotActivated { tenant_id: String },

    #[error("device registration failed: {0:#}")]
    RegistrationFailed(anyhow::Error),

    #[error(transparent)]
    RoleConflict(#[from] RoleConflict),

    #[error("a role must be selected")]
    RoleRequired,

    #[error("role '{0}' cannot be used to sign in")]
    UnsupportedRole(String),

    #[error("session token does not match the device's session")]
    InvalidSessionToken,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Transport(_) | AuthError::RegistrationFailed(_) => ErrorKind::Transport,
            AuthError::InvalidCredentials(_)
            | AuthError::NoAccess { .. }
            | AuthError::RoleRequired
            | AuthError::UnsupportedRole(_)
            | AuthError::InvalidSessionToken => ErrorKind::Access,
            AuthError::DeviceBoundElsewhere { .. }
            | AuthError::DeviceRegistered { .. }
            | AuthError::DeviceNotActivated { .. }
            | AuthError::RoleConflict(_) => ErrorKind::DeviceState,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Message shown to the person holding the device
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Transport(_) => {
                "Unable to reach the server. Please check your connection and try again."
                    .to_string()
            }
            AuthError::InvalidCredentials(message) => message.clone(),
            AuthError::NoAccess { .. } => "You don't have access to this restaurant. Please check your credentials or contact the restaurant owner.".to_string(),
            AuthError::DeviceBoundElsewhere { .. } => "This device is already assigned to another restaurant. Please use a different device or contact the restaurant owner to reassign this device.".to_string(),
            AuthError::DeviceRegistered { .. } => {
                "New device registered. Please contact the restaurant owner to activate this device."
                    .to_string()
            }
            AuthError::RegistrationFailed(_) => {
                "Failed to register device. Please try again.".to_string()
            }
            AuthError::DeviceNotActivated { .. } => {
                "This device is not activated. Please contact the restaurant owner.".to_string()
            }
            AuthError::RoleConflict(conflict) => {
                let bound = match conflict.table_number {
                    Some(number) => format!("Table {}", number),
                    None => capitalize(conflict.bound_role.as_str()),
                };
                format!(
                    "This device is already signed in as {}. Please sign in with the same role or use a different device.",
                    bound
                )
            }
            AuthError::RoleRequired => "Please select a role for this device.".to_string(),
            AuthError::UnsupportedRole(_) => {
                "Please select Owner, Staff or Table for this device.".to_string()
            }
            AuthError::InvalidSessionToken => {
                "Your session has expired. Please sign in again.".to_string()
            }
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::Rejected(message) => AuthError::InvalidCredentials(message),
            IdentityError::Transport(e) => AuthError::Transport(e),
        }
    }
}

impl From<LedgerError> for AuthError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::RoleConflict(conflict) => AuthError::RoleConflict(conflict),
            LedgerError::UnbindableRole(role) => AuthError::UnsupportedRole(role.to_string()),
            LedgerError::Store(e) => AuthError::Transport(e),
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

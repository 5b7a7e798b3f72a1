//! Device record state machine (registry/activation flow)
//!
//! `Unregistered -> (create) -> Unactivated -> (external activation) -> Activated{role}`
//!
//! Only `Activated` with a bindable role lets a login through.

use crate::common::Role;

use super::models::DeviceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unregistered,
    Unactivated,
    Activated(Role),
}

/// What the login path does for a device in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    /// Write a fresh unactivated record, then refuse the login
    Register,
    /// Refuse the login until an administrator activates the device
    AwaitActivation,
    /// Let the login through with this role
    Allow(Role),
}

impl DeviceState {
    pub fn of(record: Option<&DeviceRecord>) -> Self {
        match record {
            None => DeviceState::Unregistered,
            Some(record) => match (record.activated, record.role) {
                (true, Some(role)) if role.is_bindable() => DeviceState::Activated(role),
                // Activated without a usable role is still dormant
                _ => DeviceState::Unactivated,
            },
        }
    }

    pub fn decide(&self) -> LoginDecision {
        match self {
            DeviceState::Unregistered => LoginDecision::Register,
            DeviceState::Unactivated => LoginDecision::AwaitActivation,
            DeviceState::Activated(role) => LoginDecision::Allow(*role),
        }
    }
}

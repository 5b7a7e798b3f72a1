use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a device acts as within a tenant.
///
/// `Unactivated` is the zero-state: the absence of an activated role, never a
/// target that gets written to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Staff,
    Table,
    #[default]
    Unactivated,
}

impl Role {
    /// Parse a stored `deviceRole` string. Unknown or empty values are `Unactivated`.
    pub fn from_device_role(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Role::Owner,
            "staff" => Role::Staff,
            "table" => Role::Table,
            _ => Role::Unactivated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Staff => "staff",
            Role::Table => "table",
            Role::Unactivated => "unactivated",
        }
    }

    /// Owner, Staff and Table are the only roles a session can be bound to
    pub fn is_bindable(&self) -> bool {
        !matches!(self, Role::Unactivated)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse used for requested roles; rejects anything unknown.
impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Role::from_device_role(s) {
            Role::Unactivated if !s.trim().eq_ignore_ascii_case("unactivated") => {
                Err(format!("unknown role '{}'", s))
            }
            role => Ok(role),
        }
    }
}

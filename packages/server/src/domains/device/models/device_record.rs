use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Role;
use crate::domains::device::DeviceFingerprint;

/// Per-tenant device record, stored at `Restaurants/{tenant}/Devices/{fingerprint}`
///
/// Created unactivated on first sighting. Only an administrator's activation
/// step assigns a role; the login path only ever touches `lastLogin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(rename = "deviceRole", default, with = "stored_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub activated: bool,
    /// Free-form table label for table devices; empty otherwise
    #[serde(default)]
    pub table_number: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// Fresh record for a device seen for the first time
    pub fn unactivated(fingerprint: &DeviceFingerprint) -> Self {
        let now = Utc::now();
        Self {
            device_id: fingerprint.to_string(),
            role: None,
            activated: false,
            table_number: String::new(),
            last_login: Some(now),
            created_at: Some(now),
        }
    }

    /// Table label as a number, when it is one
    pub fn table_number_value(&self) -> Option<u32> {
        self.table_number.trim().parse().ok()
    }

    pub fn to_fields(&self) -> Result<crate::kernel::Fields> {
        crate::kernel::to_fields(self)
    }
}

/// `deviceRole` is stored as a plain string; empty means no role.
mod stored_role {
    use super::Role;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(role: &Option<Role>, s: S) -> Result<S::Ok, S::Error> {
        match role {
            Some(role) if role.is_bindable() => s.serialize_str(role.as_str()),
            _ => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Role>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        let role = Role::from_device_role(&raw);
        Ok(role.is_bindable().then_some(role))
    }
}

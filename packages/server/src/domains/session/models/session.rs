use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Role;
use crate::domains::device::DeviceFingerprint;
use crate::domains::session::token;
use crate::kernel::{to_fields, Document, Fields};

/// One (tenant, device) session row.
///
/// The row outlives logouts: it is deactivated, not deleted, so the device
/// keeps its role and table number the next time it logs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Document id; not part of the stored fields
    #[serde(skip)]
    pub id: String,
    pub principal_id: String,
    pub device_fingerprint: DeviceFingerprint,
    pub role: Role,
    /// 0 unless the role is Table
    #[serde(default)]
    pub table_number: u32,
    pub is_active: bool,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_time: Option<DateTime<Utc>>,
    /// SHA-256 of the token issued at the latest login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_hash: Option<String>,
}

impl Session {
    pub fn open(
        principal_id: &str,
        fingerprint: &DeviceFingerprint,
        role: Role,
        table_number: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            principal_id: principal_id.to_string(),
            device_fingerprint: fingerprint.clone(),
            role,
            table_number: if role == Role::Table { table_number } else { 0 },
            is_active: true,
            login_time: now,
            last_activity: now,
            logout_time: None,
            token_hash: None,
        }
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let mut session: Session = document.decode()?;
        session.id = document.id.clone();
        Ok(session)
    }

    pub fn to_fields(&self) -> Result<Fields> {
        to_fields(self)
    }

    /// Does `token` match the one issued at the latest login?
    pub fn accepts_token(&self, token: &str) -> bool {
        self.token_hash.as_deref() == Some(token::digest(token).as_str())
    }

    /// Table number as exposed to callers (only for Table sessions)
    pub fn table(&self) -> Option<u32> {
        (self.role == Role::Table && self.table_number > 0).then_some(self.table_number)
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::device::DeviceFingerprint;
use crate::kernel::{to_fields, Fields};

/// Ownership of one table number in a tenant.
///
/// Stored at `Restaurants/{tenant}/TableNumbers/{n}` and only ever written
/// with a conditional create, so each number has exactly one claimant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableClaim {
    pub table_number: u32,
    pub device_fingerprint: DeviceFingerprint,
    pub claimed_at: DateTime<Utc>,
}

impl TableClaim {
    pub fn new(table_number: u32, fingerprint: &DeviceFingerprint) -> Self {
        Self {
            table_number,
            device_fingerprint: fingerprint.clone(),
            claimed_at: Utc::now(),
        }
    }

    /// Document id of the claim for `table_number`
    pub fn document_id(table_number: u32) -> String {
        table_number.to_string()
    }

    pub fn to_fields(&self) -> Result<Fields> {
        to_fields(self)
    }
}

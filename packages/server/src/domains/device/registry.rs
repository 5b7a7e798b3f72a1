//! Per-tenant device registry (registry/activation flow)

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::common::{devices_collection, Role};
use crate::kernel::{BaseDocumentStore, Fields};

use super::models::DeviceRecord;
use super::DeviceFingerprint;

#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn BaseDocumentStore>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn BaseDocumentStore>) -> Self {
        Self { store }
    }

    /// Look up the device record for a fingerprint in a tenant
    pub async fn exists(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        let collection = devices_collection(tenant_id);
        let Some(document) = self.store.get(&collection, fingerprint.as_str()).await? else {
            return Ok(None);
        };
        let record = document
            .decode::<DeviceRecord>()
            .with_context(|| format!("Malformed device record {}/{}", collection, document.id))?;
        Ok(Some(record))
    }

    /// Write a fresh unactivated record.
    ///
    /// Not deduplicated: concurrent creates for the same fingerprint both write
    /// and the last one wins. Both writes carry identical content.
    pub async fn create(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<DeviceRecord> {
        let record = DeviceRecord::unactivated(fingerprint);
        self.store
            .set(
                &devices_collection(tenant_id),
                fingerprint.as_str(),
                record.to_fields()?,
            )
            .await?;
        info!(tenant_id = %tenant_id, device = %fingerprint, "New device registered");
        Ok(record)
    }

    /// Best-effort `lastLogin` refresh. Failures are logged, never surfaced.
    pub async fn touch_last_login(&self, tenant_id: &str, fingerprint: &DeviceFingerprint) {
        let mut fields = Fields::new();
        fields.insert("lastLogin".to_string(), json!(Utc::now()));

        if let Err(e) = self
            .store
            .update(&devices_collection(tenant_id), fingerprint.as_str(), fields)
            .await
        {
            warn!(
                tenant_id = %tenant_id,
                device = %fingerprint,
                error = %e,
                "Failed to update device last login"
            );
        }
    }

    /// Administrative activation: bind a registered device to a role.
    ///
    /// This is the out-of-band step an owner performs; the login path never
    /// calls it.
    pub async fn activate(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
        role: Role,
        table_number: Option<&str>,
    ) -> Result<()> {
        anyhow::ensure!(role.is_bindable(), "cannot activate a device as {}", role);

        let mut fields = Fields::new();
        fields.insert("activated".to_string(), json!(true));
        fields.insert("deviceRole".to_string(), json!(role.as_str()));
        fields.insert(
            "tableNumber".to_string(),
            json!(table_number.unwrap_or_default()),
        );

        self.store
            .update(&devices_collection(tenant_id), fingerprint.as_str(), fields)
            .await
            .with_context(|| format!("Device {} is not registered in {}", fingerprint, tenant_id))?;
        info!(tenant_id = %tenant_id, device = %fingerprint, role = %role, "Device activated");
        Ok(())
    }
}

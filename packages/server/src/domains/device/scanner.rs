//! Cross-tenant scan: is this fingerprint already bound to any tenant?
//!
//! Every tenant's registry is checked concurrently and the first check that
//! finds a record wins. With more than one tenant holding the fingerprint the
//! winner is whichever answers first, not the lowest tenant id.
//!
//! A failed check cannot prove the device is unbound, so when nothing was
//! found and any check failed the scan fails. Only the soft deadline turns
//! into "not bound", trading the correctness of the check for availability.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::common::TENANTS;
use crate::kernel::BaseDocumentStore;

use super::models::DeviceRecord;
use super::{DeviceFingerprint, DeviceRegistry};

/// A tenant that already holds a record for the scanned fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBinding {
    pub tenant_id: String,
    pub record: DeviceRecord,
}

pub struct CrossTenantScanner {
    store: Arc<dyn BaseDocumentStore>,
    timeout: Duration,
}

impl CrossTenantScanner {
    pub fn new(store: Arc<dyn BaseDocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Find the first tenant holding a device record for `fingerprint`.
    ///
    /// Failing to list tenants is an error, and so is a failed tenant check
    /// unless another tenant was found to hold the device.
    pub async fn scan_all_tenants_for(
        &self,
        fingerprint: &DeviceFingerprint,
    ) -> Result<Option<DeviceBinding>> {
        match tokio::time::timeout(self.timeout, self.scan(fingerprint)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    device = %fingerprint,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Cross-tenant device scan timed out; proceeding as unbound"
                );
                Ok(None)
            }
        }
    }

    async fn scan(&self, fingerprint: &DeviceFingerprint) -> Result<Option<DeviceBinding>> {
        let tenants = self.store.query(TENANTS, &[]).await?;
        debug!(device = %fingerprint, tenants = tenants.len(), "Scanning tenants for device");

        let registry = DeviceRegistry::new(self.store.clone());
        let mut checks: FuturesUnordered<_> = tenants
            .into_iter()
            .map(|tenant| {
                let registry = registry.clone();
                async move {
                    let result = registry.exists(&tenant.id, fingerprint).await;
                    (tenant.id, result)
                }
            })
            .collect();

        let mut first_failure = None;
        while let Some((tenant_id, result)) = checks.next().await {
            match result {
                Ok(Some(record)) => {
                    info!(device = %fingerprint, tenant_id = %tenant_id, "Device already bound to tenant");
                    return Ok(Some(DeviceBinding { tenant_id, record }));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        device = %fingerprint,
                        tenant_id = %tenant_id,
                        error = %e,
                        "Tenant check failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(e.context(format!(
                            "Could not check tenant {} for device {}",
                            tenant_id, fingerprint
                        )));
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

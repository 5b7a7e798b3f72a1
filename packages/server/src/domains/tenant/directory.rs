//! Tenant directory - tenant lookup and the owner access check

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::common::TENANTS;
use crate::kernel::BaseDocumentStore;

use super::models::{owner_fields, AccessKey, Tenant};

#[derive(Clone)]
pub struct TenantDirectory {
    store: Arc<dyn BaseDocumentStore>,
}

/// Tenant ids become document paths; anything that could escape the
/// `Restaurants/{id}` segment is treated as unknown.
fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.trim().is_empty() && !tenant_id.contains('/')
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn BaseDocumentStore>) -> Self {
        Self { store }
    }

    pub async fn find(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        if !is_valid_tenant_id(tenant_id) {
            return Ok(None);
        }
        let document = self.store.get(TENANTS, tenant_id).await?;
        Ok(document.as_ref().map(Tenant::from_document))
    }

    /// Is the principal allowed to operate this tenant?
    ///
    /// A missing tenant answers `false` exactly like a foreign one, so tenant
    /// ids cannot be enumerated through this check. Store failures are errors.
    pub async fn verify_access(&self, tenant_id: &str, key: AccessKey<'_>) -> Result<bool> {
        if !is_valid_tenant_id(tenant_id) {
            return Ok(false);
        }

        let Some(document) = self.store.get(TENANTS, tenant_id).await? else {
            debug!(tenant_id = %tenant_id, "Tenant not found");
            return Ok(false);
        };

        let matched = owner_fields(&document)
            .find(|(_, value)| key.matches(value))
            .map(|(field, _)| field);

        match matched {
            Some(field) => {
                info!(tenant_id = %tenant_id, field = field, "Tenant access granted");
                Ok(true)
            }
            None => {
                info!(tenant_id = %tenant_id, "Principal does not own tenant");
                Ok(false)
            }
        }
    }
}

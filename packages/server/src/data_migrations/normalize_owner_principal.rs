//! Data migration: Copy the legacy owner marker into `ownerPrincipal`
//!
//! Older tenant documents name their owner under one of several field names
//! (`userId`, `userEmail`, `email`, ...). This migration:
//! 1. Finds tenants without a non-empty `ownerPrincipal`
//! 2. Copies the first non-empty legacy owner field into it
//!    (lower-cased when it is an email address; principal ids are kept as-is)
//! 3. Leaves the legacy fields in place

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{DataMigration, MigrationContext, MigrationResult, VerifyResult};
use crate::common::TENANTS;
use crate::domains::tenant::models::{LEGACY_OWNER_FIELDS, OWNER_PRINCIPAL_FIELD};
use crate::kernel::{BaseDocumentStore, Document, Fields};

pub struct NormalizeOwnerPrincipalMigration;

#[async_trait]
impl DataMigration for NormalizeOwnerPrincipalMigration {
    fn name(&self) -> &'static str {
        "normalize_owner_principal"
    }

    fn description(&self) -> &'static str {
        "Copy the legacy tenant owner field into the normalized ownerPrincipal field"
    }

    async fn estimate(&self, store: &dyn BaseDocumentStore) -> Result<usize> {
        Ok(pending_tenants(store).await?.len())
    }

    async fn find_work(
        &self,
        cursor: Option<&str>,
        limit: usize,
        store: &dyn BaseDocumentStore,
    ) -> Result<Vec<String>> {
        let mut ids: Vec<String> = pending_tenants(store)
            .await?
            .into_iter()
            .map(|document| document.id)
            .filter(|id| cursor.map_or(true, |c| id.as_str() > c))
            .collect();
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn execute_one(&self, id: &str, ctx: &MigrationContext) -> Result<MigrationResult> {
        let skipped = if ctx.dry_run {
            MigrationResult::WouldSkip
        } else {
            MigrationResult::Skipped
        };

        // Row no longer exists
        let Some(document) = ctx.store.get(TENANTS, id).await? else {
            return Ok(skipped);
        };
        if has_owner_principal(&document) {
            return Ok(skipped);
        }
        let Some((field, value)) = legacy_owner(&document) else {
            return Ok(skipped);
        };

        let normalized = normalize_owner_marker(value);
        info!(
            tenant_id = %id,
            from_field = field,
            dry_run = ctx.dry_run,
            "Normalizing tenant owner field"
        );

        if ctx.dry_run {
            return Ok(MigrationResult::WouldMigrate);
        }

        let mut fields = Fields::new();
        fields.insert(OWNER_PRINCIPAL_FIELD.to_string(), json!(normalized));
        ctx.store.update(TENANTS, id, fields).await?;
        Ok(MigrationResult::Migrated)
    }

    async fn verify(&self, store: &dyn BaseDocumentStore) -> Result<VerifyResult> {
        let remaining = pending_tenants(store).await?.len();
        if remaining > 0 {
            return Ok(VerifyResult::Incomplete { remaining });
        }

        let issues: Vec<String> = store
            .query(TENANTS, &[])
            .await?
            .iter()
            .filter_map(|document| {
                let value = document.str_field(OWNER_PRINCIPAL_FIELD)?;
                (normalize_owner_marker(value) != value).then(|| {
                    format!(
                        "tenant {} has a non-normalized ownerPrincipal '{}'",
                        document.id, value
                    )
                })
            })
            .collect();

        if issues.is_empty() {
            Ok(VerifyResult::Passed)
        } else {
            Ok(VerifyResult::Failed { issues })
        }
    }
}

/// Tenants that still need the normalized field and have something to copy
async fn pending_tenants(store: &dyn BaseDocumentStore) -> Result<Vec<Document>> {
    Ok(store
        .query(TENANTS, &[])
        .await?
        .into_iter()
        .filter(|document| !has_owner_principal(document) && legacy_owner(document).is_some())
        .collect())
}

fn has_owner_principal(document: &Document) -> bool {
    document
        .str_field(OWNER_PRINCIPAL_FIELD)
        .is_some_and(|value| !value.trim().is_empty())
}

fn legacy_owner(document: &Document) -> Option<(&'static str, &str)> {
    LEGACY_OWNER_FIELDS.into_iter().find_map(|field| {
        document
            .str_field(field)
            .filter(|value| !value.trim().is_empty())
            .map(|value| (field, value))
    })
}

/// Emails compare case-insensitively, principal ids exactly
fn normalize_owner_marker(value: &str) -> String {
    let value = value.trim();
    if value.contains('@') {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

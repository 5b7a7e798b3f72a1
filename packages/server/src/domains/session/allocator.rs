//! Table-number allocation, serialized per tenant by the document store.
//!
//! A number belongs to whoever creates its `TableNumbers/{n}` claim. The
//! create is conditional, so allocators racing for the same candidate (in
//! one process or across many) get exactly one winner; the losers read
//! again and move to the next number.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::common::{sessions_collection, table_numbers_collection, Role};
use crate::domains::device::DeviceFingerprint;
use crate::kernel::{BaseDocumentStore, Filter};

use super::models::{Session, TableClaim};

/// Upper bound on read/claim rounds for one allocation. Each lost round
/// means another device took a number, so this only trips under extreme
/// contention.
pub const MAX_CLAIM_ATTEMPTS: u32 = 64;

#[derive(Clone)]
pub struct TableNumberAllocator {
    store: Arc<dyn BaseDocumentStore>,
}

impl TableNumberAllocator {
    pub fn new(store: Arc<dyn BaseDocumentStore>) -> Self {
        Self { store }
    }

    /// Claim the next table number in the tenant for `fingerprint`: the
    /// highest number in use plus one, or 1 when there is none. Gaps are
    /// never filled.
    ///
    /// "In use" covers every Table session, inactive ones included, and
    /// every claim. This is the one departure from counting active tables
    /// only: numbers are sticky to their device, so a number parked on an
    /// inactive session comes back when that device logs in again and must
    /// not be handed to anyone else meanwhile.
    pub async fn next(&self, tenant_id: &str, fingerprint: &DeviceFingerprint) -> Result<u32> {
        let claims = table_numbers_collection(tenant_id);
        let mut candidate = 0;

        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            candidate = self.highest_in_use(tenant_id).await?.max(candidate) + 1;

            let claim = TableClaim::new(candidate, fingerprint);
            if self
                .store
                .create(&claims, &TableClaim::document_id(candidate), claim.to_fields()?)
                .await?
            {
                debug!(
                    tenant_id = %tenant_id,
                    device = %fingerprint,
                    table_number = candidate,
                    attempt = attempt,
                    "Allocated table number"
                );
                return Ok(candidate);
            }

            debug!(
                tenant_id = %tenant_id,
                table_number = candidate,
                attempt = attempt,
                "Table number already claimed; retrying"
            );
        }

        bail!(
            "Could not claim a table number in tenant {} after {} attempts",
            tenant_id,
            MAX_CLAIM_ATTEMPTS
        )
    }

    /// Highest table number held by a Table session or a claim, 0 if none.
    ///
    /// Rows that do not decode are errors: skipping one could hand its
    /// number out twice.
    pub async fn highest_in_use(&self, tenant_id: &str) -> Result<u32> {
        let sessions = sessions_collection(tenant_id);
        let rows = self
            .store
            .query(&sessions, &[Filter::eq("role", Role::Table.as_str())])
            .await?;

        let mut highest = 0;
        for document in &rows {
            let session = Session::from_document(document).with_context(|| {
                format!("Malformed session record {}/{}", sessions, document.id)
            })?;
            highest = highest.max(session.table_number);
        }

        let claims = table_numbers_collection(tenant_id);
        for document in self.store.query(&claims, &[]).await? {
            let claim = document
                .decode::<TableClaim>()
                .with_context(|| format!("Malformed table claim {}/{}", claims, document.id))?;
            highest = highest.max(claim.table_number);
        }

        Ok(highest)
    }
}

//! Session ledger (session/role-lock flow)
//!
//! A device holds at most one session row per tenant. Its first role is
//! locked in: later logins asking for a different role are refused and the
//! stored row is left untouched.
//!
//! New rows are keyed by the device fingerprint and written with a
//! conditional create, so concurrent first logins of one device end up on a
//! single row no matter how many processes serve them.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::{sessions_collection, Role};
use crate::domains::device::DeviceFingerprint;
use crate::kernel::{BaseDocumentStore, Fields, Filter};

use super::allocator::TableNumberAllocator;
use super::models::Session;
use super::token::SessionToken;

/// The device already holds a session under another role
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device is locked to role {bound_role}")]
pub struct RoleConflict {
    pub bound_role: Role,
    pub table_number: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    RoleConflict(#[from] RoleConflict),

    #[error("cannot open a session as {0}")]
    UnbindableRole(Role),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// An active session and the token that can end it
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session: Session,
    pub token: SessionToken,
}

#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn BaseDocumentStore>,
    allocator: TableNumberAllocator,
}

impl SessionLedger {
    pub fn new(store: Arc<dyn BaseDocumentStore>) -> Self {
        Self {
            allocator: TableNumberAllocator::new(store.clone()),
            store,
        }
    }

    /// The role (and table number) this device is bound to in the tenant, if any
    pub async fn bound_role(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> anyhow::Result<Option<(Role, Option<u32>)>> {
        Ok(self
            .find_for_device(tenant_id, fingerprint)
            .await?
            .map(|session| (session.role, session.table())))
    }

    /// Reactivate this device's session or create its first one, issuing a
    /// fresh session token either way.
    ///
    /// A Table device claims its number before its row is written. When the
    /// same device races itself and loses the row, the number it claimed is
    /// left unused; distinct devices never collide.
    pub async fn open_or_reuse(
        &self,
        tenant_id: &str,
        principal_id: &str,
        fingerprint: &DeviceFingerprint,
        role: Role,
    ) -> Result<OpenedSession, LedgerError> {
        if !role.is_bindable() {
            return Err(LedgerError::UnbindableRole(role));
        }

        if let Some(existing) = self.find_for_device(tenant_id, fingerprint).await? {
            return self.reuse(tenant_id, existing, principal_id, role).await;
        }

        let table_number = if role == Role::Table {
            self.allocator.next(tenant_id, fingerprint).await?
        } else {
            0
        };

        let token = SessionToken::generate();
        let mut session = Session::open(principal_id, fingerprint, role, table_number);
        session.id = fingerprint.as_str().to_string();
        session.token_hash = Some(token.hash());

        let created = self
            .store
            .create(&sessions_collection(tenant_id), &session.id, session.to_fields()?)
            .await?;
        if !created {
            warn!(
                tenant_id = %tenant_id,
                device = %fingerprint,
                unused_table_number = ?session.table(),
                "Session row created by a concurrent login; reusing it"
            );
            let existing = self
                .find_for_device(tenant_id, fingerprint)
                .await?
                .ok_or_else(|| anyhow!("Session row for device {} disappeared", fingerprint))?;
            return self.reuse(tenant_id, existing, principal_id, role).await;
        }

        info!(
            tenant_id = %tenant_id,
            device = %fingerprint,
            role = %role,
            table_number = ?session.table(),
            "Session created"
        );
        Ok(OpenedSession { session, token })
    }

    /// The device's session, if `token` is the one issued at its latest login
    pub async fn authenticate(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
        token: &str,
    ) -> anyhow::Result<Option<Session>> {
        Ok(self
            .find_for_device(tenant_id, fingerprint)
            .await?
            .filter(|session| session.accepts_token(token)))
    }

    /// Deactivate the active sessions of (principal, device). Idempotent.
    ///
    /// Returns how many sessions were closed.
    pub async fn close(
        &self,
        tenant_id: &str,
        principal_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> anyhow::Result<usize> {
        let collection = sessions_collection(tenant_id);
        let active = self
            .store
            .query(
                &collection,
                &[
                    Filter::eq("principalId", principal_id),
                    Filter::eq("deviceFingerprint", fingerprint.as_str()),
                    Filter::eq("isActive", true),
                ],
            )
            .await?;

        let now = Utc::now();
        for document in &active {
            let mut fields = Fields::new();
            fields.insert("isActive".to_string(), json!(false));
            fields.insert("logoutTime".to_string(), json!(now));
            fields.insert("lastActivity".to_string(), json!(now));
            self.store
                .update(&collection, &document.id, fields)
                .await
                .with_context(|| format!("Failed to close session {}", document.id))?;
        }

        debug!(tenant_id = %tenant_id, device = %fingerprint, closed = active.len(), "Sessions closed");
        Ok(active.len())
    }

    async fn find_for_device(
        &self,
        tenant_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> anyhow::Result<Option<Session>> {
        let collection = sessions_collection(tenant_id);
        let documents = self
            .store
            .query(
                &collection,
                &[Filter::eq("deviceFingerprint", fingerprint.as_str())],
            )
            .await?;

        let mut sessions = documents
            .iter()
            .map(|document| {
                Session::from_document(document).with_context(|| {
                    format!("Malformed session record {}/{}", collection, document.id)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if sessions.len() > 1 {
            warn!(
                tenant_id = %tenant_id,
                device = %fingerprint,
                rows = sessions.len(),
                "Multiple session rows for one device; using the oldest"
            );
        }

        sessions.sort_by(|a, b| a.login_time.cmp(&b.login_time).then(a.id.cmp(&b.id)));
        Ok(sessions.into_iter().next())
    }

    async fn reuse(
        &self,
        tenant_id: &str,
        mut session: Session,
        principal_id: &str,
        role: Role,
    ) -> Result<OpenedSession, LedgerError> {
        if session.role != role {
            warn!(
                tenant_id = %tenant_id,
                device = %session.device_fingerprint,
                bound_role = %session.role,
                requested_role = %role,
                "Role conflict"
            );
            return Err(RoleConflict {
                bound_role: session.role,
                table_number: session.table(),
            }
            .into());
        }

        let token = SessionToken::generate();
        let now = Utc::now();
        let mut fields = Fields::new();
        fields.insert("principalId".to_string(), json!(principal_id));
        fields.insert("isActive".to_string(), json!(true));
        fields.insert("lastActivity".to_string(), json!(now));
        fields.insert("tokenHash".to_string(), json!(token.hash()));
        self.store
            .update(&sessions_collection(tenant_id), &session.id, fields)
            .await?;

        session.principal_id = principal_id.to_string();
        session.is_active = true;
        session.last_activity = now;
        session.token_hash = Some(token.hash());

        info!(
            tenant_id = %tenant_id,
            device = %session.device_fingerprint,
            role = %role,
            table_number = ?session.table(),
            "Session reactivated"
        );
        Ok(OpenedSession { session, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryDocumentStore;

    fn ledger() -> (Arc<MemoryDocumentStore>, SessionLedger) {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = SessionLedger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn test_first_login_creates_session() {
        let (store, ledger) = ledger();
        let opened = ledger
            .open_or_reuse("7", "uid", &"FP-1".into(), Role::Table)
            .await
            .unwrap();
        assert_eq!(opened.session.table(), Some(1));
        assert!(opened.session.is_active);
        assert_eq!(opened.session.id, "FP-1");
        assert_eq!(store.documents(&sessions_collection("7")).len(), 1);
    }

    #[tokio::test]
    async fn test_reactivation_keeps_row_and_number() {
        let (store, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        let first = ledger.open_or_reuse("7", "uid", &fp, Role::Table).await.unwrap();
        assert_eq!(ledger.close("7", "uid", &fp).await.unwrap(), 1);

        let second = ledger.open_or_reuse("7", "uid", &fp, Role::Table).await.unwrap();
        assert_eq!(second.session.id, first.session.id);
        assert_eq!(second.session.table(), first.session.table());
        assert!(second.session.is_active);
        assert_eq!(store.documents(&sessions_collection("7")).len(), 1);
    }

    #[tokio::test]
    async fn test_reactivation_rotates_the_token() {
        let (_, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        let first = ledger.open_or_reuse("7", "uid", &fp, Role::Staff).await.unwrap();
        let second = ledger.open_or_reuse("7", "uid", &fp, Role::Staff).await.unwrap();

        assert!(ledger
            .authenticate("7", &fp, first.token.as_str())
            .await
            .unwrap()
            .is_none());
        let session = ledger
            .authenticate("7", &fp, second.token.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.principal_id, "uid");
    }

    #[tokio::test]
    async fn test_token_is_bound_to_device_and_tenant() {
        let (_, ledger) = ledger();
        let opened = ledger
            .open_or_reuse("7", "uid", &"FP-1".into(), Role::Staff)
            .await
            .unwrap();
        ledger
            .open_or_reuse("7", "uid", &"FP-2".into(), Role::Staff)
            .await
            .unwrap();

        let token = opened.token.as_str();
        assert!(ledger.authenticate("7", &"FP-2".into(), token).await.unwrap().is_none());
        assert!(ledger.authenticate("8", &"FP-1".into(), token).await.unwrap().is_none());
        assert!(ledger.authenticate("7", &"FP-1".into(), token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_role_conflict_leaves_row_untouched() {
        let (store, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        let first = ledger.open_or_reuse("7", "uid", &fp, Role::Staff).await.unwrap();
        let before = store.document(&sessions_collection("7"), &first.session.id).unwrap();

        let err = ledger
            .open_or_reuse("7", "uid", &fp, Role::Owner)
            .await
            .unwrap_err();
        match err {
            LedgerError::RoleConflict(conflict) => assert_eq!(conflict.bound_role, Role::Staff),
            other => panic!("expected role conflict, got {other:?}"),
        }

        let after = store.document(&sessions_collection("7"), &first.session.id).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_legacy_row_with_store_assigned_id_is_reused() {
        let (store, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        let legacy = Session::open("uid-other", &fp, Role::Staff, 0);
        let legacy_id = store
            .add(&sessions_collection("7"), legacy.to_fields().unwrap())
            .await
            .unwrap();

        let opened = ledger.open_or_reuse("7", "uid", &fp, Role::Staff).await.unwrap();
        assert_eq!(opened.session.id, legacy_id);
        assert_eq!(opened.session.principal_id, "uid");
        assert_eq!(store.documents(&sessions_collection("7")).len(), 1);
    }

    #[tokio::test]
    async fn test_unactivated_role_is_refused() {
        let (_, ledger) = ledger();
        let err = ledger
            .open_or_reuse("7", "uid", &"FP".into(), Role::Unactivated)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnbindableRole(Role::Unactivated)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (store, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        let opened = ledger.open_or_reuse("7", "uid", &fp, Role::Staff).await.unwrap();

        assert_eq!(ledger.close("7", "uid", &fp).await.unwrap(), 1);
        assert_eq!(ledger.close("7", "uid", &fp).await.unwrap(), 0);

        let row = store.document(&sessions_collection("7"), &opened.session.id).unwrap();
        assert_eq!(row.fields["isActive"], serde_json::json!(false));
        assert!(row.fields.contains_key("logoutTime"));
    }

    #[tokio::test]
    async fn test_close_without_session_is_ok() {
        let (_, ledger) = ledger();
        assert_eq!(ledger.close("7", "uid", &"FP".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bound_role() {
        let (_, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        assert_eq!(ledger.bound_role("7", &fp).await.unwrap(), None);
        ledger.open_or_reuse("7", "uid", &fp, Role::Table).await.unwrap();
        assert_eq!(
            ledger.bound_role("7", &fp).await.unwrap(),
            Some((Role::Table, Some(1)))
        );
    }

    #[tokio::test]
    async fn test_tenants_are_independent() {
        let (_, ledger) = ledger();
        let fp: DeviceFingerprint = "FP-1".into();
        ledger.open_or_reuse("1", "uid", &fp, Role::Staff).await.unwrap();
        let other = ledger.open_or_reuse("2", "uid", &fp, Role::Table).await.unwrap();
        assert_eq!(other.session.table(), Some(1));
    }
}

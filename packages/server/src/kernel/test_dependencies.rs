// TestDependencies - mock implementations for testing
//
// Provides an in-memory document store and a scripted identity provider that
// can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::{
    BaseDocumentStore, BaseIdentityProvider, Document, Fields, Filter, IdentityError, Principal,
    ServerDeps,
};

// =============================================================================
// Memory Document Store
// =============================================================================

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

pub struct MemoryDocumentStore {
    collections: Arc<Mutex<Collections>>,
    offline: AtomicBool,
    latency: Option<Duration>,
    slow_suffix: Option<(String, Duration)>,
    get_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(BTreeMap::new())),
            offline: AtomicBool::new(false),
            latency: None,
            slow_suffix: None,
            get_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before every operation (widens race windows in concurrency tests)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sleep before reads of collections whose path ends with `suffix`
    pub fn with_slow_collection(mut self, suffix: &str, latency: Duration) -> Self {
        self.slow_suffix = Some((suffix.to_string(), latency));
        self
    }

    /// Seed a document synchronously
    pub fn with_document(self, collection: &str, id: &str, fields: serde_json::Value) -> Self {
        let fields = match fields {
            serde_json::Value::Object(map) => map,
            _ => Fields::new(),
        };
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        self
    }

    /// Make every subsequent operation fail like an unreachable backend
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of a collection
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of a single document
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    async fn before(&self, collection: &str) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some((suffix, latency)) = &self.slow_suffix {
            if collection.ends_with(suffix.as_str()) {
                tokio::time::sleep(*latency).await;
            }
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("document store unreachable"));
        }
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseDocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.before(collection).await?;
        Ok(self.document(collection, id))
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        self.before(collection).await?;
        Ok(self
            .documents(collection)
            .into_iter()
            .filter(|doc| filters.iter().all(|f| f.matches(&doc.fields)))
            .collect())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.before(collection).await?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.before(collection).await?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| anyhow!("No document to update at {}/{}", collection, id))?;
        existing.extend(fields);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        self.before(collection).await?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let id = Uuid::now_v7().to_string();
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        self.before(collection).await?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        match collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
        {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(fields);
                Ok(true)
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.before("").await
    }
}

// =============================================================================
// Mock Identity Provider
// =============================================================================

struct Account {
    password: String,
    principal: Principal,
}

pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    /// Open sign-ins per principal id
    signed_in: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            signed_in: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account. Emails are matched case-insensitively.
    pub fn with_account(self, email: &str, password: &str, principal_id: &str) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                principal: Principal {
                    id: principal_id.to_string(),
                    email: email.to_string(),
                },
            },
        );
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Sign-ins of `principal_id` not yet followed by a sign-out
    pub fn open_sign_ins(&self, principal_id: &str) -> usize {
        self.signed_in
            .lock()
            .unwrap()
            .get(principal_id)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseIdentityProvider for MockIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityError::Transport(anyhow!(
                "identity provider unreachable"
            )));
        }

        let principal = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => Principal {
                    id: account.principal.id.clone(),
                    // Report the email the way the caller typed it
                    email: email.to_string(),
                },
                _ => {
                    return Err(IdentityError::Rejected(
                        "The email or password is incorrect.".to_string(),
                    ))
                }
            }
        };

        *self
            .signed_in
            .lock()
            .unwrap()
            .entry(principal.id.clone())
            .or_default() += 1;
        Ok(principal)
    }

    async fn sign_out(&self, principal_id: &str) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let mut signed_in = self.signed_in.lock().unwrap();
        if let Some(open) = signed_in.get_mut(principal_id) {
            *open = open.saturating_sub(1);
            if *open == 0 {
                signed_in.remove(principal_id);
            }
        }
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Bundle of mocks that can be turned into `ServerDeps`
pub struct TestDependencies {
    pub store: Arc<MemoryDocumentStore>,
    pub identity: Arc<MockIdentityProvider>,
    pub scan_timeout: Duration,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryDocumentStore::new()),
            identity: Arc::new(MockIdentityProvider::new()),
            scan_timeout: Duration::from_secs(5),
        }
    }

    pub fn mock_store(mut self, store: MemoryDocumentStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn mock_identity(mut self, identity: MockIdentityProvider) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Build ServerDeps sharing these mocks (the mocks stay inspectable)
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(self.store.clone(), self.identity.clone(), self.scan_timeout)
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

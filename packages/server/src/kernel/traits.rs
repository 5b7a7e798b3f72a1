// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (device registration, role locks, table allocation) lives in
// domains/ and is written against these traits.
//
// Naming convention: Base* for trait names (e.g., BaseDocumentStore)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Document Store Trait (Infrastructure - generic document database)
// =============================================================================

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// String value of a field, if present and a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Decode the fields into a typed model.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(Into::into)
    }
}

/// Equality filter used by [`BaseDocumentStore::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True if the document carries `field == value`.
    pub fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// Serialize a model into a field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    /// Fetch a single document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Fetch every document matching all equality filters.
    /// An empty filter list returns the whole collection.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Merge fields into an existing document. Fails if the document is missing.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Insert a document with a store-assigned id
    async fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Insert a document only if `id` is free, atomically.
    /// Returns `false` and writes nothing when the document already exists.
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<bool>;

    /// Cheap connectivity check for health endpoints
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Identity Provider Trait (Infrastructure - email/password sign-in)
// =============================================================================

/// The human identity returned by the identity provider after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

/// Sign-in failure, split so callers can tell bad input from an outage.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider answered and refused the credentials.
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached or answered garbage.
    #[error("identity provider unavailable: {0}")]
    Transport(#[from] anyhow::Error),
}

/// Shared by every concurrent attempt, so implementations keep no notion of
/// a "current" principal. Per-attempt state lives in `IdentitySession`.
#[async_trait]
pub trait BaseIdentityProvider: Send + Sync {
    /// Verify email/password and return the principal
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, IdentityError>;

    /// End one sign-in of `principal_id`
    async fn sign_out(&self, principal_id: &str) -> Result<()>;
}

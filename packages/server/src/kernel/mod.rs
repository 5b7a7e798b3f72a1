//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod document_store;
pub mod identity_provider;
pub mod identity_session;
pub mod test_dependencies;
pub mod traits;

// Other exports
pub use deps::{ServerDeps, DEFAULT_SCAN_TIMEOUT};
pub use document_store::PostgresDocumentStore;
pub use identity_provider::{RestIdentityProvider, DEFAULT_IDENTITY_BASE_URL};
pub use identity_session::IdentitySession;
pub use test_dependencies::{MemoryDocumentStore, MockIdentityProvider, TestDependencies};
pub use traits::*;

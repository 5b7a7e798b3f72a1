//! Server dependencies for the authorization domains (using traits for testability)
//!
//! `ServerDeps` is the explicit context object handed to every domain
//! component. It is built once by the binary's bootstrap and cloned into
//! whatever needs it; there is no ambient global auth state.

use std::sync::Arc;
use std::time::Duration;

use crate::kernel::{BaseDocumentStore, BaseIdentityProvider};

/// Default soft timeout for the cross-tenant device scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies shared by every authorization attempt
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseDocumentStore>,
    pub identity: Arc<dyn BaseIdentityProvider>,
    /// Soft deadline for the cross-tenant device scan
    pub scan_timeout: Duration,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseDocumentStore>,
        identity: Arc<dyn BaseIdentityProvider>,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            scan_timeout,
        }
    }
}

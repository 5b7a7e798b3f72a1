//! Session domain - role-locked sessions and table-number allocation
//!
//! Responsibilities:
//! - One session row per (tenant, device), deactivated on logout, never deleted
//! - First role wins; a different role on the same device is refused
//! - Distinct table numbers under concurrent first logins, serialized by
//!   conditional writes in the document store
//! - A per-login session token that lets the device end its own session

pub mod allocator;
pub mod ledger;
pub mod models;
pub mod token;

pub use allocator::{TableNumberAllocator, MAX_CLAIM_ATTEMPTS};
pub use ledger::{LedgerError, OpenedSession, RoleConflict, SessionLedger};
pub use models::{Session, TableClaim};
pub use token::SessionToken;

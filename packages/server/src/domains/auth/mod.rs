//! Auth domain - decides whether a device may act for a role in a tenant
//!
//! Responsibilities:
//! - Registry flow: cross-tenant binding check, credentials, tenant access,
//!   device registration and activation gating
//! - Session flow: credentials, tenant access, role-locked session with
//!   table-number allocation
//! - Error taxonomy and the result type handed to callers

pub mod actions;
pub mod engine;
pub mod errors;
pub mod types;

pub use engine::AuthorizationEngine;
pub use errors::{AuthError, ErrorKind};
pub use types::{AuthFlow, AuthorizationResult, Authorized, LoginRequest};

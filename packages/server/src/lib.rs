// Device-Bound Session Authorization - API Core
//
// This crate authorizes a physical device to act as exactly one role
// (owner, staff or table) within exactly one restaurant tenant.
// Architecture follows the kernel / domains / server split: infrastructure
// traits live in kernel/, business rules in domains/*.

pub mod common;
pub mod config;
pub mod data_migrations;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

// Common types shared across domains

pub mod collections;
pub mod role;

pub use collections::*;
pub use role::Role;

// Business domains
pub mod auth;
pub mod device;
pub mod session;
pub mod tenant;

//! Device domain - who is this device, and which tenant already knows it
//!
//! Responsibilities:
//! - Stable device fingerprint (local or client-reported)
//! - Per-tenant device records and their activation state machine
//! - Cross-tenant "already bound elsewhere" scan

pub mod identity;
pub mod machines;
pub mod models;
pub mod registry;
pub mod scanner;

pub use identity::{
    ClientFingerprint, DeviceFingerprint, DeviceIdentity, FingerprintOrigin, LocalDeviceIdentity,
    MachineIdSource, PlatformIdSource,
};
pub use machines::{DeviceState, LoginDecision};
pub use models::DeviceRecord;
pub use registry::DeviceRegistry;
pub use scanner::{CrossTenantScanner, DeviceBinding};

//! Device identity - the stable fingerprint a device presents when logging in.
//!
//! On the device itself the fingerprint is derived once from the platform's
//! machine identifier and persisted next to the client. When the platform has
//! no identifier a random one is used for the lifetime of the process; that
//! fallback is not stable across reinstalls.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Scopes derived fingerprints to this application, so the raw machine id
/// never leaves the device.
const FINGERPRINT_NAMESPACE: &str = "e-waiter.device-fingerprint.v1";

/// Opaque, best-effort stable identifier of a physical device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceFingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceFingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Source of the fingerprint for one authorization attempt
pub trait DeviceIdentity: Send + Sync {
    fn current_fingerprint(&self) -> DeviceFingerprint;
}

/// A fingerprint reported by a remote client (HTTP callers)
#[derive(Debug, Clone)]
pub struct ClientFingerprint(pub DeviceFingerprint);

impl DeviceIdentity for ClientFingerprint {
    fn current_fingerprint(&self) -> DeviceFingerprint {
        self.0.clone()
    }
}

// =============================================================================
// Platform identifier
// =============================================================================

/// Supplies the platform-stable machine identifier, if the platform has one
pub trait PlatformIdSource: Send + Sync {
    fn platform_id(&self) -> Option<String>;
}

/// Reads the machine id from the first readable file of a candidate list
pub struct MachineIdSource {
    candidates: Vec<PathBuf>,
}

impl MachineIdSource {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }
}

impl Default for MachineIdSource {
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from("/etc/machine-id"),
            PathBuf::from("/var/lib/dbus/machine-id"),
        ])
    }
}

impl PlatformIdSource for MachineIdSource {
    fn platform_id(&self) -> Option<String> {
        self.candidates.iter().find_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|id| !id.is_empty())
        })
    }
}

// =============================================================================
// Local identity
// =============================================================================

/// Where the local fingerprint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintOrigin {
    /// Read back from the local fingerprint file
    Persisted,
    /// Freshly derived from the platform identifier (and persisted)
    Platform,
    /// Random, valid for this process only
    Ephemeral,
}

/// Fingerprint of the device this process runs on. Resolved once.
#[derive(Debug, Clone)]
pub struct LocalDeviceIdentity {
    fingerprint: DeviceFingerprint,
    origin: FingerprintOrigin,
}

impl LocalDeviceIdentity {
    /// Resolve the local fingerprint: persisted file, then platform id, then random.
    pub fn resolve(store_path: &Path, source: &dyn PlatformIdSource) -> Self {
        if let Some(fingerprint) = read_persisted(store_path) {
            debug!(path = %store_path.display(), "Loaded persisted device fingerprint");
            return Self {
                fingerprint,
                origin: FingerprintOrigin::Persisted,
            };
        }

        if let Some(raw) = source.platform_id() {
            let fingerprint = derive_fingerprint(&raw);
            if let Err(e) = persist(store_path, &fingerprint) {
                warn!(
                    path = %store_path.display(),
                    error = %e,
                    "Failed to persist device fingerprint"
                );
            } else {
                info!(path = %store_path.display(), "Derived and persisted device fingerprint");
            }
            return Self {
                fingerprint,
                origin: FingerprintOrigin::Platform,
            };
        }

        warn!("Platform identifier unavailable; using an ephemeral device fingerprint");
        Self {
            fingerprint: DeviceFingerprint::new(Uuid::new_v4().to_string().to_uppercase()),
            origin: FingerprintOrigin::Ephemeral,
        }
    }

    pub fn origin(&self) -> FingerprintOrigin {
        self.origin
    }

    /// False when the fingerprint will not survive a restart
    pub fn is_stable(&self) -> bool {
        self.origin != FingerprintOrigin::Ephemeral
    }
}

impl DeviceIdentity for LocalDeviceIdentity {
    fn current_fingerprint(&self) -> DeviceFingerprint {
        self.fingerprint.clone()
    }
}

fn derive_fingerprint(raw: &str) -> DeviceFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_NAMESPACE.as_bytes());
    hasher.update(b":");
    hasher.update(raw.as_bytes());
    DeviceFingerprint::new(hex::encode(hasher.finalize()))
}

fn read_persisted(path: &Path) -> Option<DeviceFingerprint> {
    std::fs::read_to_string(path)
        .ok()
        .map(|raw| DeviceFingerprint::new(raw.trim()))
        .filter(|fp| !fp.is_empty())
}

fn persist(path: &Path, fingerprint: &DeviceFingerprint) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, fingerprint.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Option<&'static str>);

    impl PlatformIdSource for FixedSource {
        fn platform_id(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_platform_fingerprint_is_derived_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-id");

        let first = LocalDeviceIdentity::resolve(&path, &FixedSource(Some("abc123")));
        assert_eq!(first.origin(), FingerprintOrigin::Platform);
        assert!(first.is_stable());
        assert_eq!(first.current_fingerprint().as_str().len(), 64);
        assert_ne!(first.current_fingerprint().as_str(), "abc123");

        // Second resolve reads the file even if the platform id changed
        let second = LocalDeviceIdentity::resolve(&path, &FixedSource(Some("other")));
        assert_eq!(second.origin(), FingerprintOrigin::Persisted);
        assert_eq!(second.current_fingerprint(), first.current_fingerprint());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(derive_fingerprint("m1"), derive_fingerprint("m1"));
        assert_ne!(derive_fingerprint("m1"), derive_fingerprint("m2"));
    }

    #[test]
    fn test_missing_platform_id_falls_back_to_ephemeral() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-id");

        let identity = LocalDeviceIdentity::resolve(&path, &FixedSource(None));
        assert_eq!(identity.origin(), FingerprintOrigin::Ephemeral);
        assert!(!identity.is_stable());
        // Stable for the lifetime of the value
        assert_eq!(identity.current_fingerprint(), identity.current_fingerprint());
        // Ephemeral fingerprints are never written
        assert!(!path.exists());
    }

    #[test]
    fn test_machine_id_source_skips_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let real = dir.path().join("machine-id");
        std::fs::write(&empty, "  \n").unwrap();
        std::fs::write(&real, "f00dfeed\n").unwrap();

        let source = MachineIdSource::new(vec![dir.path().join("missing"), empty, real]);
        assert_eq!(source.platform_id().as_deref(), Some("f00dfeed"));
    }
}

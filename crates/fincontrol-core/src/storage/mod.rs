//! Key/value storage backends for persisted credentials.
//!
//! Credentials are kept behind the [`SecureStorage`] capability so the
//! credential store never branches on platform. The backend is picked once at
//! startup from configuration:
//!
//! - `KeyringStorage`: OS keychain (macOS Keychain, Windows Credential Manager,
//!   Linux kernel keyring)
//! - `FileStorage`: a JSON file in the application data directory
//! - `MemoryStorage`: process memory only, for ephemeral sessions and tests

pub mod file;
pub mod keychain;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::file::FileStorage;
pub use self::keychain::KeyringStorage;
pub use self::memory::MemoryStorage;

/// Keychain service name shared by every entry this application writes
pub const KEYCHAIN_SERVICE: &str = "fincontrol";

/// File name used by the file backend inside the data directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Refusing to store malformed value: {0}")]
    Malformed(String),
}

/// Minimal get/set/delete capability over string values.
///
/// A missing key is not an error: `get` returns `Ok(None)` and `delete` is a
/// no-op. Any other failure is reported to the caller.
pub trait SecureStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Which storage backend to use for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

impl StorageBackend {
    /// Parse a backend name (case-insensitive), as used by environment overrides.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "keyring" | "keychain" => Some(StorageBackend::Keyring),
            "file" => Some(StorageBackend::File),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Construct the configured backend. `data_dir` is only used by the file backend.
pub fn open(backend: StorageBackend, data_dir: &Path) -> Arc<dyn SecureStorage> {
    match backend {
        StorageBackend::Keyring => Arc::new(KeyringStorage::new(KEYCHAIN_SERVICE)),
        StorageBackend::File => Arc::new(FileStorage::new(data_dir.join(CREDENTIALS_FILE))),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(StorageBackend::parse("keyring"), Some(StorageBackend::Keyring));
        assert_eq!(StorageBackend::parse("Keychain"), Some(StorageBackend::Keyring));
        assert_eq!(StorageBackend::parse(" FILE "), Some(StorageBackend::File));
        assert_eq!(StorageBackend::parse("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("localStorage"), None);
    }

    #[test]
    fn test_backend_serde_names() {
        let json = serde_json::to_string(&StorageBackend::File).unwrap();
        assert_eq!(json, "\"file\"");
        let parsed: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(parsed, StorageBackend::Memory);
    }

    #[test]
    fn test_open_memory_backend_is_usable() {
        let storage = open(StorageBackend::Memory, Path::new("/nonexistent"));
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }
}

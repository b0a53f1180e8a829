//! Common types used throughout VaultSync.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The association between one plaintext file and its encrypted vault file.
///
/// Pairs are one-to-one: the vault path is always the source path with the
/// configured suffix appended (e.g. `secrets.env` ↔ `secrets.env.vault`).
/// Either side may be missing on disk; the synchronizer decides what to do
/// about that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedPair {
    /// Path of the plaintext file.
    pub source: PathBuf,
    /// Path of the companion vault file.
    pub vault: PathBuf,
}

impl TrackedPair {
    /// Build a pair from a plaintext path by appending the vault suffix.
    pub fn from_source(source: impl Into<PathBuf>, suffix: &str) -> Self {
        let source = source.into();
        let vault = vault_name(&source, suffix);
        Self { source, vault }
    }

    /// Recover a pair from a vault path by stripping the suffix.
    ///
    /// Returns `None` if the path does not end with the suffix (it is not a
    /// vault file) or is not valid UTF-8.
    pub fn from_vault(vault: impl Into<PathBuf>, suffix: &str) -> Option<Self> {
        let vault = vault.into();
        let source = source_name(&vault, suffix)?;
        Some(Self { source, vault })
    }
}

/// Vault path for a plaintext path: the source path with `suffix` appended.
pub fn vault_name(source: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Plaintext path for a vault path, or `None` if `vault` does not carry the
/// suffix.
pub fn source_name(vault: &Path, suffix: &str) -> Option<PathBuf> {
    vault
        .to_str()
        .and_then(|s| s.strip_suffix(suffix))
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

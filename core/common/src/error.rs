//! Common error types for VaultSync.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for VaultSync operations.
///
/// Every variant that refers to a file carries the offending path, and
/// wrapping variants keep their underlying cause as a `source` so callers
/// can print the full causal chain.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material shorter than the 256-bit minimum.
    #[error("key material too short: {actual} bytes (need at least 32)")]
    KeyMaterialTooShort { actual: usize },

    /// The HKDF step failed; never silently falls back to weak output.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// HMAC tag mismatch: the vault was tampered with or the key is wrong.
    #[error("authentication failed: vault tag does not match (tampered data or wrong key)")]
    AuthenticationFailed,

    /// PKCS#7 padding bytes were not self-consistent after decryption.
    #[error("malformed padding in decrypted data")]
    MalformedPadding,

    /// Ciphertext shorter than a single AES block.
    #[error("ciphertext too short: {len} bytes (minimum one 16-byte block)")]
    CiphertextTooShort { len: usize },

    /// Ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext length {len} is not a multiple of the 16-byte block size")]
    BlockAlignment { len: usize },

    /// The vault container could not be decoded: bad base64, truncated
    /// frame, or an unrecognized format version.
    #[error("invalid vault format: {0}")]
    InvalidVaultFormat(String),

    /// A freshly written vault failed its readback verification.
    #[error("write verification failed for {}", path.display())]
    WriteVerification {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// A single file could not be restored from its vault.
    #[error("failed to restore {}", path.display())]
    Restore {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Rotation phase 1 gate: not every vault could be restored.
    #[error("restore incomplete: {failed} file(s) could not be restored from their vaults")]
    RestoreIncomplete { failed: usize },

    /// Terminal state of a failed key rotation. Once phase 3 has run the
    /// backup path is always present so the old key stays recoverable.
    #[error(
        "key rotation aborted at phase {phase}; old key backup: {}",
        .backup
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none (not yet created)".to_string())
    )]
    RotationAborted {
        phase: u8,
        backup: Option<PathBuf>,
        #[source]
        source: Box<Error>,
    },

    /// Project configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task failed to complete.
    #[error("worker task failed: {0}")]
    Task(String),
}

impl Error {
    /// Wrap this error as a per-file restore failure.
    pub fn into_restore(self, path: impl Into<PathBuf>) -> Self {
        Error::Restore {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_rotation_aborted_without_backup() {
        let err = Error::RotationAborted {
            phase: 1,
            backup: None,
            source: Box::new(Error::RestoreIncomplete { failed: 2 }),
        };
        let msg = err.to_string();
        assert!(msg.contains("phase 1"));
        assert!(msg.contains("none"));
    }

    #[test]
    fn test_rotation_aborted_reports_backup_path() {
        let err = Error::RotationAborted {
            phase: 4,
            backup: Some(PathBuf::from("/keys/master.key.backup_20260101_120000")),
            source: Box::new(Error::Config("disk full".into())),
        };
        assert!(err.to_string().contains("backup_20260101_120000"));
    }

    #[test]
    fn test_causal_chain_is_preserved() {
        let inner = Error::AuthenticationFailed;
        let outer = inner.into_restore("secrets.env");
        let source = outer.source().expect("restore error must carry a source");
        assert!(source.to_string().contains("authentication failed"));
    }
}

//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vaultsync_common::{Error, Result};

/// Length of key material and derived subkeys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// The sole secret: master key material from which all subkeys derive.
///
/// Key material is created by a secure random generator or loaded from the
/// hex-encoded key file, and is never mutated in place — rotation produces
/// a fresh `KeyMaterial` value and retires the old one to a backup file.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Create key material from raw bytes.
    ///
    /// # Errors
    /// - `KeyMaterialTooShort` if fewer than [`KEY_LENGTH`] bytes are given.
    ///   Short material is rejected here, before any cryptographic operation
    ///   can be attempted with it.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < KEY_LENGTH {
            return Err(Error::KeyMaterialTooShort {
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Generate fresh key material from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parse key material from its hex key-file encoding.
    ///
    /// Surrounding whitespace (the key file's trailing newline) is ignored.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| Error::Config(format!("key file is not valid hex: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Hex encoding used by the on-disk key file.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

/// Independent encryption and authentication subkeys.
///
/// Derived deterministically from [`KeyMaterial`] (see [`crate::kdf`]),
/// never persisted, and safe to share read-only across worker threads.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SubkeyPair {
    pub(crate) enc_key: [u8; KEY_LENGTH],
    pub(crate) mac_key: [u8; KEY_LENGTH],
}

impl SubkeyPair {
    /// Key used for AES-256-CBC encryption.
    pub fn enc_key(&self) -> &[u8; KEY_LENGTH] {
        &self.enc_key
    }

    /// Key used for HMAC-SHA256 authentication.
    pub fn mac_key(&self) -> &[u8; KEY_LENGTH] {
        &self.mac_key
    }
}

impl fmt::Debug for SubkeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubkeyPair([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_material_rejected() {
        let err = KeyMaterial::from_bytes(vec![0u8; 31]).unwrap_err();
        assert!(matches!(err, Error::KeyMaterialTooShort { actual: 31 }));
    }

    #[test]
    fn test_exact_length_accepted() {
        assert!(KeyMaterial::from_bytes(vec![0u8; 32]).is_ok());
        assert!(KeyMaterial::from_bytes(vec![0u8; 48]).is_ok());
    }

    #[test]
    fn test_generate_is_random() {
        let a = KeyMaterial::generate();
        let b = KeyMaterial::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.as_bytes().len(), KEY_LENGTH);
    }

    #[test]
    fn test_hex_round_trip() {
        let key = KeyMaterial::generate();
        let restored = KeyMaterial::from_hex(&format!("{}\n", key.to_hex())).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = KeyMaterial::generate();
        assert_eq!(format!("{:?}", key), "KeyMaterial([REDACTED])");
    }
}

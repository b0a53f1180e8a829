//! Subkey derivation using HKDF-SHA256.
//!
//! From the master key material we derive two independent subkeys:
//! - an **encryption key** for AES-256-CBC, and
//! - an **authentication key** for HMAC-SHA256.
//!
//! Separate keys for the cipher and the authenticator prevent key-reuse
//! attacks between the two primitives. The derivation is deterministic:
//! the same key material always yields the same subkey pair, so subkeys
//! never need to be persisted.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::keys::{KeyMaterial, SubkeyPair, KEY_LENGTH};
use vaultsync_common::{Error, Result};

/// HKDF context label for the encryption subkey.
const ENCRYPTION_CONTEXT: &[u8] = b"encryption";

/// HKDF context label for the authentication subkey.
const AUTHENTICATION_CONTEXT: &[u8] = b"authentication";

/// Derive the encryption/authentication subkey pair from key material.
///
/// # Preconditions
/// - `material` must be at least [`KEY_LENGTH`] bytes (enforced again here
///   so no caller can reach the KDF with short material)
///
/// # Postconditions
/// - Returns a deterministic subkey pair: same input, same output
/// - The two subkeys are independent (distinct HKDF context labels)
///
/// # Errors
/// - `KeyMaterialTooShort` if the material is under 32 bytes
/// - `KeyDerivation` if HKDF expansion fails; this never silently falls
///   back to low-entropy output
pub fn derive_subkeys(material: &KeyMaterial) -> Result<SubkeyPair> {
    if material.as_bytes().len() < KEY_LENGTH {
        return Err(Error::KeyMaterialTooShort {
            actual: material.as_bytes().len(),
        });
    }

    let hk = Hkdf::<Sha256>::new(None, material.as_bytes());

    let mut enc_key = [0u8; KEY_LENGTH];
    hk.expand(ENCRYPTION_CONTEXT, &mut enc_key)
        .map_err(|e| Error::KeyDerivation(format!("HKDF expand (encryption) failed: {e}")))?;

    let mut mac_key = [0u8; KEY_LENGTH];
    hk.expand(AUTHENTICATION_CONTEXT, &mut mac_key)
        .map_err(|e| Error::KeyDerivation(format!("HKDF expand (authentication) failed: {e}")))?;

    Ok(SubkeyPair { enc_key, mac_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(byte: u8) -> KeyMaterial {
        KeyMaterial::from_bytes(vec![byte; KEY_LENGTH]).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_subkeys(&material(7)).unwrap();
        let b = derive_subkeys(&material(7)).unwrap();
        assert_eq!(a.enc_key(), b.enc_key());
        assert_eq!(a.mac_key(), b.mac_key());
    }

    #[test]
    fn test_subkeys_are_independent() {
        let pair = derive_subkeys(&material(7)).unwrap();
        assert_ne!(pair.enc_key(), pair.mac_key());
    }

    #[test]
    fn test_different_material_different_subkeys() {
        let a = derive_subkeys(&material(1)).unwrap();
        let b = derive_subkeys(&material(2)).unwrap();
        assert_ne!(a.enc_key(), b.enc_key());
        assert_ne!(a.mac_key(), b.mac_key());
    }
}

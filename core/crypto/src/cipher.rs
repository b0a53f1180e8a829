//! Authenticated encryption using AES-256-CBC with HMAC-SHA256.
//!
//! Records use encrypt-then-MAC: the tag covers `version ‖ IV ‖ ciphertext`
//! and is verified — in constant time — before any decryption happens, so a
//! tampered record is rejected without ever touching the cipher. Verifying
//! first also keeps padding errors from acting as a padding oracle.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::keys::SubkeyPair;
use vaultsync_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Vault record format version produced by this implementation.
pub const FORMAT_VERSION: u8 = 0x01;

/// Initialization vector size for AES-CBC (16 bytes).
pub const IV_LENGTH: usize = 16;

/// Authentication tag size for HMAC-SHA256 (32 bytes).
pub const TAG_LENGTH: usize = 32;

/// AES block size (16 bytes).
pub const BLOCK_LENGTH: usize = 16;

/// The authenticated-encrypted representation of one plaintext file.
///
/// A record is immutable once produced: re-encrypting a file yields a new
/// record (with a fresh IV), never an in-place edit. Any mutation of the
/// IV, ciphertext, or tag invalidates the authentication check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    /// Format version tag ([`FORMAT_VERSION`] for records we produce).
    pub version: u8,
    /// Random initialization vector, unique per encryption.
    pub iv: [u8; IV_LENGTH],
    /// PKCS#7-padded AES-256-CBC ciphertext.
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over `version ‖ IV ‖ ciphertext`.
    pub tag: [u8; TAG_LENGTH],
}

/// Authenticated-encrypt a plaintext buffer.
///
/// # Postconditions
/// - A fresh random IV is generated on every call, even for identical
///   plaintext — the core confidentiality invariant
/// - Empty plaintext is accepted and produces a valid one-block record
///
/// # Errors
/// - `KeyDerivation` if the MAC cannot be keyed (cannot happen with a
///   well-formed [`SubkeyPair`], but never ignored)
pub fn encrypt(subkeys: &SubkeyPair, plaintext: &[u8]) -> Result<VaultRecord> {
    if plaintext.is_empty() {
        debug!("encrypting empty plaintext into an empty-payload record");
    }

    let mut iv = [0u8; IV_LENGTH];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(subkeys.enc_key().into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = compute_tag(subkeys.mac_key(), FORMAT_VERSION, &iv, &ciphertext)?;

    Ok(VaultRecord {
        version: FORMAT_VERSION,
        iv,
        ciphertext,
        tag,
    })
}

/// Verify and decrypt a vault record.
///
/// The checks run in a fixed order, each with its own failure kind:
/// 1. `CiphertextTooShort` — ciphertext under one AES block
/// 2. `BlockAlignment` — length not a multiple of the block size
/// 3. `AuthenticationFailed` — tag mismatch, compared in constant time;
///    the ciphertext is never decrypted-then-checked
/// 4. `MalformedPadding` — PKCS#7 bytes inconsistent after decryption
pub fn decrypt(subkeys: &SubkeyPair, record: &VaultRecord) -> Result<Vec<u8>> {
    let len = record.ciphertext.len();
    if len < BLOCK_LENGTH {
        return Err(Error::CiphertextTooShort { len });
    }
    if len % BLOCK_LENGTH != 0 {
        return Err(Error::BlockAlignment { len });
    }

    let expected = compute_tag(subkeys.mac_key(), record.version, &record.iv, &record.ciphertext)?;
    if !bool::from(expected.ct_eq(&record.tag)) {
        return Err(Error::AuthenticationFailed);
    }

    Aes256CbcDec::new(subkeys.enc_key().into(), (&record.iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&record.ciphertext)
        .map_err(|_| Error::MalformedPadding)
}

fn compute_tag(
    mac_key: &[u8; 32],
    version: u8,
    iv: &[u8; IV_LENGTH],
    ciphertext: &[u8],
) -> Result<[u8; TAG_LENGTH]> {
    let mut mac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| Error::KeyDerivation(format!("failed to key HMAC: {e}")))?;
    mac.update(&[version]);
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().into())
}

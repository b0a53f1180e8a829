//! Cryptographic engine for VaultSync.
//!
//! This crate provides:
//! - Key material handling with automatic zeroization
//! - Subkey derivation using HKDF-SHA256
//! - Authenticated encryption using AES-256-CBC with HMAC-SHA256
//!   (encrypt-then-MAC with independently derived keys)
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - The authentication tag is verified in constant time, before any
//!   decryption is attempted

pub mod cipher;
pub mod kdf;
pub mod keys;

pub use cipher::{decrypt, encrypt, VaultRecord};
pub use cipher::{BLOCK_LENGTH, FORMAT_VERSION, IV_LENGTH, TAG_LENGTH};
pub use kdf::derive_subkeys;
pub use keys::{KeyMaterial, SubkeyPair, KEY_LENGTH};

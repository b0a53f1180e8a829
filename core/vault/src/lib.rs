//! Vault container handling for VaultSync.
//!
//! This crate provides:
//! - The on-disk vault container format (base64 framing over the
//!   authenticated record produced by `vaultsync-crypto`)
//! - The atomic write-then-verify-then-rename discipline for vault and
//!   key files
//! - Key file I/O: loading, generation, and timestamped backups
//!
//! # Architecture
//! The codec is pure serialize/deserialize; all filesystem effects live in
//! [`writer`] and [`keyfile`], and every write reports the permissions it
//! set via a [`WriteReceipt`] so callers and tests can assert on them.

pub mod codec;
pub mod keyfile;
pub mod writer;

pub use codec::{deserialize, serialize, MIN_FRAME_LENGTH};
pub use writer::{read_vault, write_atomic, write_vault_atomic, WriteReceipt, SECRET_FILE_MODE};

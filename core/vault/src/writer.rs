//! Atomic write discipline for vault, key, and restored plaintext files.
//!
//! Every write goes through a temporary file in the destination directory:
//! full write, flush to durable storage, readback verification, then a
//! rename over the destination. The rename is the commit point, so a
//! half-written file can never be observed in place of a previously good
//! one, and the temporary file is cleaned up on every failure path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec;
use vaultsync_common::{Error, Result};
use vaultsync_crypto::VaultRecord;

/// Owner read/write only, applied to every file we create.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Record of a completed atomic write.
///
/// Permission effects are reported here as data rather than buried in
/// helper side effects, so tests can assert on them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Destination path that was committed.
    pub path: PathBuf,
    /// File mode that was set, or `None` on platforms without Unix modes.
    pub mode: Option<u32>,
}

/// Atomically write `bytes` to `path` with owner-only permissions.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<WriteReceipt> {
    write_atomic_verified(path, bytes, |_| Ok(()))
}

/// Atomically write a serialized vault record to `path`.
///
/// The temporary file is re-read and re-deserialized before the rename;
/// a failure there surfaces as `WriteVerification` and leaves any
/// previously good vault untouched.
pub fn write_vault_atomic(path: &Path, record: &VaultRecord) -> Result<WriteReceipt> {
    let text = codec::serialize(record);
    write_atomic_verified(path, text.as_bytes(), |written| {
        let text = std::str::from_utf8(written)
            .map_err(|_| Error::InvalidVaultFormat("vault container is not UTF-8".to_string()))?;
        codec::deserialize(text).map(|_| ())
    })
}

/// Read and parse a vault container from disk.
pub fn read_vault(path: &Path) -> Result<VaultRecord> {
    let text = fs::read_to_string(path)?;
    codec::deserialize(&text)
}

fn write_atomic_verified(
    path: &Path,
    bytes: &[u8],
    verify: impl Fn(&[u8]) -> Result<()>,
) -> Result<WriteReceipt> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".vaultsync-tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    let mode = set_secret_mode(tmp.as_file())?;

    // Verify the durable bytes before the rename commits them.
    let written = fs::read(tmp.path())?;
    if written != bytes {
        return Err(Error::WriteVerification {
            path: path.to_path_buf(),
            source: Box::new(Error::InvalidVaultFormat(
                "written bytes differ from intended content".to_string(),
            )),
        });
    }
    verify(&written).map_err(|e| Error::WriteVerification {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!(path = %path.display(), "atomic write committed");

    Ok(WriteReceipt {
        path: path.to_path_buf(),
        mode,
    })
}

#[cfg(unix)]
fn set_secret_mode(file: &fs::File) -> Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(SECRET_FILE_MODE))?;
    Ok(Some(SECRET_FILE_MODE))
}

#[cfg(not(unix))]
fn set_secret_mode(_file: &fs::File) -> Result<Option<u32>> {
    Ok(None)
}

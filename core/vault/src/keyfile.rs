//! Key file I/O.
//!
//! The key file holds the master key material as 64 lowercase hex
//! characters followed by a newline, mode 0600. It is read once per
//! invocation and never mutated in place: rotation writes a brand-new key
//! file and retires the old one to a timestamped backup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::writer::{write_atomic, WriteReceipt};
use vaultsync_common::{Error, Result};
use vaultsync_crypto::KeyMaterial;

/// Load key material from the hex-encoded key file.
///
/// # Errors
/// - `Config` if the file is missing or not valid hex
/// - `KeyMaterialTooShort` if it decodes to fewer than 32 bytes
pub fn load(path: &Path) -> Result<KeyMaterial> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Config(format!("key file {} does not exist", path.display()))
        } else {
            Error::Io(e)
        }
    })?;
    KeyMaterial::from_hex(&text)
}

/// Write key material to `path` in the key file format, atomically and
/// with owner-only permissions.
pub fn write(path: &Path, material: &KeyMaterial) -> Result<WriteReceipt> {
    write_atomic(path, format!("{}\n", material.to_hex()).as_bytes())
}

/// Generate fresh key material and persist it to `path`.
pub fn generate(path: &Path) -> Result<(KeyMaterial, WriteReceipt)> {
    let material = KeyMaterial::generate();
    let receipt = write(path, &material)?;
    info!(path = %path.display(), "generated new key file");
    Ok((material, receipt))
}

/// Copy the key file to `<name>.backup_<YYYYMMDD_HHMMSS>` with identical
/// permissions and return the backup path.
///
/// If that name is already taken (two rotations within one second), a
/// numeric suffix is appended so an earlier backup is never overwritten.
pub fn backup(path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let base = format!("{}.backup_{stamp}", path.display());

    let mut candidate = PathBuf::from(&base);
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}_{counter}"));
        counter += 1;
    }

    fs::copy(path, &candidate)?;
    let perms = fs::metadata(path)?.permissions();
    fs::set_permissions(&candidate, perms)?;

    info!(
        key = %path.display(),
        backup = %candidate.display(),
        "backed up key file"
    );
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");

        let (material, receipt) = generate(&path).unwrap();
        assert_eq!(receipt.path, path);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.as_bytes(), material.as_bytes());
    }

    #[test]
    fn test_key_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        generate(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let body = text.trim_end();
        assert_eq!(body.len(), 64);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.key")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_rejects_short_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.key");
        fs::write(&path, format!("{}\n", hex::encode([1u8; 31]))).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, Error::KeyMaterialTooShort { actual: 31 }));
    }

    #[test]
    fn test_backup_never_collides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        generate(&path).unwrap();

        let first = backup(&path).unwrap();
        let second = backup(&path).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("master.key.backup_"));
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_preserves_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        generate(&path).unwrap();

        let backup_path = backup(&path).unwrap();
        let mode = fs::metadata(&backup_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, crate::writer::SECRET_FILE_MODE);
    }
}

//! The five-phase key rotation transaction.
//!
//! Phases run strictly in order, each gated on full success of the one
//! before; within a phase, per-file work still uses the synchronizer's
//! bounded worker pool. There is no automatic rollback of completed
//! phases — phase 1 guarantees every vault's content exists as plaintext,
//! so the remedy for a late failure is forward recovery (retry phase 5
//! with the new key), and the old key is always recoverable from the
//! backup recorded in phase 3.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::engine::{remove_vaults, SyncMode, SyncOptions, Synchronizer};
use crate::report::SyncReport;
use vaultsync_common::{Error, Result, TrackedPair};
use vaultsync_vault::keyfile;

/// Summary of a completed rotation.
#[derive(Debug)]
pub struct RekeyOutcome {
    /// Files restored to plaintext in phase 1.
    pub restored: usize,
    /// Vault files purged in phase 2.
    pub removed: usize,
    /// Vaults rebuilt under the new key in phase 5.
    pub reencrypted: usize,
    /// Where the retired key material was backed up.
    pub backup_path: PathBuf,
    /// Path of the newly installed key file.
    pub new_key_path: PathBuf,
}

/// Replace the key at `key_path` and re-encrypt every tracked pair.
///
/// # Errors
/// Any phase failure aborts immediately with
/// `RotationAborted { phase, backup, .. }`; once phase 3 has run, `backup`
/// names the live copy of the old key so manual recovery is always
/// possible. Phase 1 failures carry the underlying `RestoreIncomplete`
/// gate: proceeding would risk losing content that only exists inside a
/// vault encrypted with the key about to be retired.
pub async fn rotate_key(
    key_path: &Path,
    pairs: &[TrackedPair],
    max_parallel: usize,
) -> Result<RekeyOutcome> {
    let material = keyfile::load(key_path).map_err(|e| aborted(1, None, e))?;

    // Phase 1: restore everything under the current key.
    info!(phase = 1, files = pairs.len(), "restoring plaintext from all vaults");
    let refresh = Synchronizer::new(
        &material,
        SyncOptions {
            mode: SyncMode::ForceRefresh,
            max_parallel,
        },
    )
    .map_err(|e| aborted(1, None, e))?;

    let restore_report = refresh.run(pairs.to_vec()).await;
    if !restore_report.is_clean() {
        let failed = restore_report.failed;
        log_failures(&restore_report, 1);
        return Err(aborted(1, None, Error::RestoreIncomplete { failed }));
    }
    let restored = restore_report.restored;

    // Phase 2: purge old vaults; only reached once plaintext is proven.
    info!(phase = 2, "purging vault files");
    let purge_report = remove_vaults(pairs.to_vec(), max_parallel).await;
    if !purge_report.is_clean() {
        log_failures(&purge_report, 2);
        return Err(aborted(2, None, first_error(purge_report)));
    }
    let removed = purge_report.removed;

    // Phase 3: back up the old key before anything touches the key file.
    let backup_path = keyfile::backup(key_path).map_err(|e| aborted(3, None, e))?;
    info!(phase = 3, backup = %backup_path.display(), "old key backed up");

    // Phase 4: install fresh key material. From here on every error must
    // name the backup path so the old key is never lost.
    let (new_material, _receipt) = keyfile::generate(key_path)
        .map_err(|e| aborted(4, Some(backup_path.clone()), e))?;
    info!(phase = 4, key = %key_path.display(), "new key installed");

    // Phase 5: rebuild every vault from plaintext under the new key.
    info!(phase = 5, "re-encrypting all tracked files");
    let reencrypt = Synchronizer::new(
        &new_material,
        SyncOptions {
            mode: SyncMode::ForceEncrypt,
            max_parallel,
        },
    )
    .map_err(|e| aborted(5, Some(backup_path.clone()), e))?;

    let encrypt_report = reencrypt.run(pairs.to_vec()).await;
    if !encrypt_report.is_clean() {
        log_failures(&encrypt_report, 5);
        return Err(aborted(5, Some(backup_path), first_error(encrypt_report)));
    }

    let outcome = RekeyOutcome {
        restored,
        removed,
        reencrypted: encrypt_report.created + encrypt_report.updated,
        backup_path,
        new_key_path: key_path.to_path_buf(),
    };
    info!(
        restored = outcome.restored,
        removed = outcome.removed,
        reencrypted = outcome.reencrypted,
        "key rotation complete"
    );
    Ok(outcome)
}

fn aborted(phase: u8, backup: Option<PathBuf>, source: Error) -> Error {
    Error::RotationAborted {
        phase,
        backup,
        source: Box::new(source),
    }
}

fn log_failures(report: &SyncReport, phase: u8) {
    for (path, err) in &report.failures {
        error!(phase, path = %path.display(), error = %err, "rotation phase failure");
    }
}

fn first_error(report: SyncReport) -> Error {
    match report.into_first_failure() {
        Some((_, error)) => error,
        None => Error::Task("phase reported failure without details".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use vaultsync_crypto::{decrypt, derive_subkeys};
    use vaultsync_vault::read_vault;

    fn pair(dir: &Path, name: &str) -> TrackedPair {
        TrackedPair::from_source(dir.join(name), ".vault")
    }

    async fn encrypt_all(key_path: &Path, pairs: &[TrackedPair]) {
        let material = keyfile::load(key_path).unwrap();
        let sync = Synchronizer::new(&material, SyncOptions::default()).unwrap();
        let report = sync.run(pairs.to_vec()).await;
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_full_rotation_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join(".vaultsync.key");
        keyfile::generate(&key_path).unwrap();

        fs::write(dir.path().join("a.env"), "A=1").unwrap();
        fs::write(dir.path().join("b.env"), "B=2").unwrap();
        let pairs = vec![pair(dir.path(), "a.env"), pair(dir.path(), "b.env")];
        encrypt_all(&key_path, &pairs).await;

        let old_material = keyfile::load(&key_path).unwrap();

        let outcome = rotate_key(&key_path, &pairs, 4).await.unwrap();
        assert_eq!(outcome.restored, 2);
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.reencrypted, 2);
        assert!(outcome.backup_path.exists());

        // The new key decrypts every rebuilt vault to the original content.
        let new_material = keyfile::load(&key_path).unwrap();
        assert_ne!(new_material.as_bytes(), old_material.as_bytes());
        let new_keys = derive_subkeys(&new_material).unwrap();
        let record = read_vault(&pairs[0].vault).unwrap();
        assert_eq!(decrypt(&new_keys, &record).unwrap(), b"A=1");

        // The retired key no longer decrypts the new vaults...
        let old_keys = derive_subkeys(&keyfile::load(&outcome.backup_path).unwrap()).unwrap();
        assert!(matches!(
            decrypt(&old_keys, &record).unwrap_err(),
            Error::AuthenticationFailed
        ));
    }

    #[tokio::test]
    async fn test_rotation_aborts_at_phase_one_on_corrupt_vault() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join(".vaultsync.key");
        keyfile::generate(&key_path).unwrap();

        fs::write(dir.path().join("a.env"), "A=1").unwrap();
        let pairs = vec![pair(dir.path(), "a.env"), pair(dir.path(), "broken.env")];
        encrypt_all(&key_path, &pairs).await;

        // Corrupt one vault so its restore must fail.
        fs::write(&pairs[1].vault, "garbage\n").unwrap();
        // Ensure the only copy of its content is the (corrupt) vault.
        assert!(!pairs[1].source.exists());

        let err = rotate_key(&key_path, &pairs, 4).await.unwrap_err();
        match err {
            Error::RotationAborted { phase, backup, source } => {
                assert_eq!(phase, 1);
                assert!(backup.is_none());
                assert!(matches!(*source, Error::RestoreIncomplete { failed: 1 }));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing was purged and the key file is untouched.
        assert!(pairs[0].vault.exists());
        assert!(key_path.exists());
    }

    #[tokio::test]
    async fn test_rotation_with_missing_key_fails_before_any_phase_work() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("missing.key");
        let pairs: Vec<TrackedPair> = Vec::new();

        let err = rotate_key(&key_path, &pairs, 4).await.unwrap_err();
        assert!(matches!(err, Error::RotationAborted { phase: 1, .. }));
    }

    #[tokio::test]
    async fn test_rotation_backup_still_decrypts_old_records() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join(".vaultsync.key");
        keyfile::generate(&key_path).unwrap();

        fs::write(dir.path().join("a.env"), "A=1").unwrap();
        let pairs = vec![pair(dir.path(), "a.env")];
        encrypt_all(&key_path, &pairs).await;

        // Keep a copy of an old vault around, as a cautious operator might.
        let old_vault_copy = fs::read_to_string(&pairs[0].vault).unwrap();

        let outcome = rotate_key(&key_path, &pairs, 4).await.unwrap();

        let old_material = keyfile::load(&outcome.backup_path).unwrap();
        let old_keys = derive_subkeys(&old_material).unwrap();
        let old_record = vaultsync_vault::deserialize(&old_vault_copy).unwrap();
        assert_eq!(decrypt(&old_keys, &old_record).unwrap(), b"A=1");
    }
}

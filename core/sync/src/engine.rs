//! The checksum-driven synchronization engine.
//!
//! Each tracked pair is evaluated independently against a small decision
//! table and mapped to exactly one action. Per-file operations touch only
//! their own plaintext/vault paths, so batches run them on a bounded
//! blocking worker pool; nothing is cancelled mid-file because every write
//! goes through the atomic write-then-verify-then-rename discipline.
//!
//! Drift detection is decrypt-to-compare: the hash recorded at the time a
//! vault was written is the SHA-256 of its decrypted payload, checked
//! against the SHA-256 of the plaintext currently on disk.

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::report::{FileOutcome, SyncReport};
use vaultsync_common::{Error, Result, TrackedPair};
use vaultsync_crypto::{decrypt, derive_subkeys, encrypt, KeyMaterial, SubkeyPair};
use vaultsync_vault::{read_vault, write_atomic, write_vault_atomic};

/// Direction preference for a synchronization pass.
///
/// The two force modes are mutually exclusive operating modes — a single
/// pass honors one direction only, never both, so a file can never
/// ping-pong between conflicting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Follow the decision table: encrypt what drifted, restore what is
    /// missing, skip what is in sync.
    #[default]
    Auto,
    /// Plaintext is the source of truth: when both files exist the vault
    /// is rewritten even if the content is unchanged (used to migrate
    /// algorithm or key changes).
    ForceEncrypt,
    /// The vault is the source of truth: when both files exist the
    /// plaintext is overwritten from the vault.
    ForceRefresh,
}

/// Per-pass options, always passed in explicitly — never read from
/// ambient or global state.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Upper bound on concurrently processed files; keeps descriptor use
    /// bounded on large trees.
    pub max_parallel: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Auto,
            max_parallel: 8,
        }
    }
}

/// Per-pair filesystem state, the input to the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    MissingBoth,
    PlaintextOnly,
    VaultOnly,
    BothInSync,
    BothDrifted,
}

/// The one action the table selects for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Skip,
    Create,
    Update,
    Restore,
}

/// Decide the action for an observed pair state under the given mode.
///
/// Force direction only matters when both files exist; the single-sided
/// rows of the table are mode-independent.
pub fn decide(state: PairState, mode: SyncMode) -> SyncAction {
    match state {
        PairState::MissingBoth => SyncAction::Skip,
        PairState::PlaintextOnly => SyncAction::Create,
        PairState::VaultOnly => SyncAction::Restore,
        PairState::BothInSync | PairState::BothDrifted => match mode {
            SyncMode::ForceEncrypt => SyncAction::Update,
            SyncMode::ForceRefresh => SyncAction::Restore,
            SyncMode::Auto => {
                if state == PairState::BothDrifted {
                    SyncAction::Update
                } else {
                    SyncAction::Skip
                }
            }
        },
    }
}

/// Synchronizer for one key: derives the subkey pair once and applies the
/// decision table across tracked pairs.
pub struct Synchronizer {
    subkeys: SubkeyPair,
    options: SyncOptions,
}

impl Synchronizer {
    /// Derive subkeys from the key material and build a synchronizer.
    ///
    /// # Errors
    /// - `KeyMaterialTooShort` / `KeyDerivation` from subkey derivation
    pub fn new(material: &KeyMaterial, options: SyncOptions) -> Result<Self> {
        Ok(Self {
            subkeys: derive_subkeys(material)?,
            options,
        })
    }

    /// Run one synchronization pass over the pairs.
    ///
    /// Per-file failures are collected into the report and do not abort
    /// sibling files.
    pub async fn run(&self, pairs: Vec<TrackedPair>) -> SyncReport {
        let subkeys = self.subkeys.clone();
        let mode = self.options.mode;
        let report = run_pool(pairs, self.options.max_parallel, move |pair| {
            sync_pair(&subkeys, mode, pair)
        })
        .await;
        info!(mode = ?mode, %report, "sync pass finished");
        report
    }
}

/// Delete the vault file of every pair. Needs no key material.
pub async fn remove_vaults(pairs: Vec<TrackedPair>, max_parallel: usize) -> SyncReport {
    let report = run_pool(pairs, max_parallel, remove_pair).await;
    info!(%report, "vault removal finished");
    report
}

async fn run_pool<F>(pairs: Vec<TrackedPair>, limit: usize, op: F) -> SyncReport
where
    F: Fn(&TrackedPair) -> FileOutcome + Clone + Send + 'static,
{
    let limit = limit.max(1);
    let mut tasks: JoinSet<FileOutcome> = JoinSet::new();
    let mut report = SyncReport::default();

    for pair in pairs {
        // Keep at most `limit` files in flight.
        while tasks.len() >= limit {
            if let Some(joined) = tasks.join_next().await {
                report.record(unwrap_joined(joined));
            }
        }

        let op = op.clone();
        tasks.spawn_blocking(move || op(&pair));
    }

    while let Some(joined) = tasks.join_next().await {
        report.record(unwrap_joined(joined));
    }
    report
}

fn unwrap_joined(joined: std::result::Result<FileOutcome, tokio::task::JoinError>) -> FileOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "sync worker did not complete");
            FileOutcome::Failed {
                path: PathBuf::new(),
                error: Error::Task(e.to_string()),
            }
        }
    }
}

fn sync_pair(subkeys: &SubkeyPair, mode: SyncMode, pair: &TrackedPair) -> FileOutcome {
    match sync_pair_inner(subkeys, mode, pair) {
        Ok(outcome) => outcome,
        Err(error) => FileOutcome::Failed {
            path: pair.source.clone(),
            error,
        },
    }
}

fn sync_pair_inner(
    subkeys: &SubkeyPair,
    mode: SyncMode,
    pair: &TrackedPair,
) -> Result<FileOutcome> {
    let state = classify(subkeys, mode, pair)?;
    let action = decide(state, mode);
    debug!(
        source = %pair.source.display(),
        state = ?state,
        action = ?action,
        "pair evaluated"
    );
    apply(subkeys, pair, action)
}

/// Observe the pair's filesystem state.
///
/// The drift comparison decrypts the vault to recover the recorded hash;
/// under a force mode the comparison result cannot change the action, so
/// the decryption is skipped.
fn classify(subkeys: &SubkeyPair, mode: SyncMode, pair: &TrackedPair) -> Result<PairState> {
    let has_source = pair.source.is_file();
    let has_vault = pair.vault.is_file();

    Ok(match (has_source, has_vault) {
        (false, false) => PairState::MissingBoth,
        (true, false) => PairState::PlaintextOnly,
        (false, true) => PairState::VaultOnly,
        (true, true) => {
            if mode != SyncMode::Auto {
                // Either force direction overwrites regardless of drift.
                PairState::BothDrifted
            } else if is_drifted(subkeys, pair)? {
                PairState::BothDrifted
            } else {
                PairState::BothInSync
            }
        }
    })
}

fn is_drifted(subkeys: &SubkeyPair, pair: &TrackedPair) -> Result<bool> {
    let current = sha256(&fs::read(&pair.source)?);

    let record = read_vault(&pair.vault).map_err(|e| e.into_restore(&pair.source))?;
    let recorded_plaintext =
        decrypt(subkeys, &record).map_err(|e| e.into_restore(&pair.source))?;

    Ok(sha256(&recorded_plaintext) != current)
}

fn apply(subkeys: &SubkeyPair, pair: &TrackedPair, action: SyncAction) -> Result<FileOutcome> {
    match action {
        SyncAction::Skip => Ok(FileOutcome::Skipped),
        SyncAction::Create | SyncAction::Update => {
            let plaintext = fs::read(&pair.source)?;
            let record = encrypt(subkeys, &plaintext)?;
            write_vault_atomic(&pair.vault, &record)?;
            if action == SyncAction::Create {
                info!(vault = %pair.vault.display(), "created vault file");
                Ok(FileOutcome::Created)
            } else {
                info!(vault = %pair.vault.display(), "updated vault file");
                Ok(FileOutcome::Updated)
            }
        }
        SyncAction::Restore => {
            let record = read_vault(&pair.vault).map_err(|e| e.into_restore(&pair.source))?;
            let plaintext =
                decrypt(subkeys, &record).map_err(|e| e.into_restore(&pair.source))?;
            write_atomic(&pair.source, &plaintext)
                .map_err(|e| e.into_restore(&pair.source))?;
            info!(source = %pair.source.display(), "restored plaintext from vault");
            Ok(FileOutcome::Restored)
        }
    }
}

fn remove_pair(pair: &TrackedPair) -> FileOutcome {
    if !pair.vault.is_file() {
        return FileOutcome::Skipped;
    }
    match fs::remove_file(&pair.vault) {
        Ok(()) => {
            info!(vault = %pair.vault.display(), "removed vault file");
            FileOutcome::Removed
        }
        Err(e) => FileOutcome::Failed {
            path: pair.vault.clone(),
            error: e.into(),
        },
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

//! Aggregate results of a batch synchronization pass.

use std::fmt;
use std::path::PathBuf;

use vaultsync_common::Error;

/// What happened to a single tracked pair during a batch pass.
#[derive(Debug)]
pub enum FileOutcome {
    /// A new vault was written for a plaintext file.
    Created,
    /// An existing vault was re-encrypted.
    Updated,
    /// Plaintext was restored from its vault.
    Restored,
    /// A vault file was deleted.
    Removed,
    /// Nothing to do.
    Skipped,
    /// The pair failed; sibling files are unaffected.
    Failed { path: PathBuf, error: Error },
}

/// Aggregate report of a batch pass — never a bare boolean.
///
/// Every failure keeps the offending path and the underlying error so a
/// caller can print the full causal chain.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub restored: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<(PathBuf, Error)>,
}

impl SyncReport {
    /// Fold one file outcome into the totals.
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Created => self.created += 1,
            FileOutcome::Updated => self.updated += 1,
            FileOutcome::Restored => self.restored += 1,
            FileOutcome::Removed => self.removed += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed { path, error } => {
                self.failed += 1;
                self.failures.push((path, error));
            }
        }
    }

    /// True when no file in the batch failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Consume the report, yielding the first recorded failure if any.
    pub fn into_first_failure(self) -> Option<(PathBuf, Error)> {
        self.failures.into_iter().next()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, updated {}, restored {}, removed {}, skipped {}, failed {}",
            self.created, self.updated, self.restored, self.removed, self.skipped, self.failed
        )
    }
}

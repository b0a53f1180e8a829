//! `.gitignore` maintenance for tracked plaintext files.
//!
//! Plaintext sources must never reach version control; only their vault
//! companions are safe to commit. [`ensure_ignored`] appends any missing
//! entries to the project root's `.gitignore`, and [`check_ignored`]
//! reports what is missing without modifying anything.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use vaultsync_common::Result;

/// When set (and the project is a git checkout), `.gitignore` is left
/// untouched so pre-commit hooks and CI runs cannot mutate the tree.
pub const PRECOMMIT_ENV: &str = "VAULTSYNC_PRECOMMIT";

/// Make sure every source path is listed in `<root>/.gitignore`,
/// creating the file if needed. Returns the entries that were added.
pub fn ensure_ignored(root: &Path, sources: &[PathBuf]) -> Result<Vec<String>> {
    if std::env::var_os(PRECOMMIT_ENV).is_some() && root.join(".git").exists() {
        return Ok(Vec::new());
    }

    let gitignore = root.join(".gitignore");
    let existing = read_entries(&gitignore)?;

    let mut added = Vec::new();
    for source in sources {
        let entry = relative_entry(root, source);
        if !existing.contains(&entry) && !added.contains(&entry) {
            added.push(entry);
        }
    }

    if !added.is_empty() {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore)?;
        for entry in &added {
            writeln!(file, "{entry}")?;
            info!(entry = %entry, "added to .gitignore");
        }
    }

    Ok(added)
}

/// Source paths not currently listed in `.gitignore`. Read-only.
pub fn check_ignored(root: &Path, sources: &[PathBuf]) -> Result<Vec<String>> {
    let existing = read_entries(&root.join(".gitignore"))?;
    Ok(sources
        .iter()
        .map(|source| relative_entry(root, source))
        .filter(|entry| !existing.contains(entry))
        .collect())
}

fn read_entries(gitignore: &Path) -> Result<BTreeSet<String>> {
    if !gitignore.exists() {
        return Ok(BTreeSet::new());
    }
    Ok(fs::read_to_string(gitignore)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn relative_entry(root: &Path, source: &Path) -> String {
    source
        .strip_prefix(root)
        .unwrap_or(source)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_gitignore_and_adds_entries() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![dir.path().join("secrets.env"), dir.path().join("db/creds.env")];

        let added = ensure_ignored(dir.path(), &sources).unwrap();
        assert_eq!(added, vec!["secrets.env", "db/creds.env"]);

        let body = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(body.contains("secrets.env"));
        assert!(body.contains("db/creds.env"));
    }

    #[test]
    fn test_existing_entries_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "secrets.env\n").unwrap();
        let sources = vec![dir.path().join("secrets.env")];

        let added = ensure_ignored(dir.path(), &sources).unwrap();
        assert!(added.is_empty());

        let body = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(body.matches("secrets.env").count(), 1);
    }

    #[test]
    fn test_check_reports_missing_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![dir.path().join("secrets.env")];

        let missing = check_ignored(dir.path(), &sources).unwrap();
        assert_eq!(missing, vec!["secrets.env"]);
        assert!(!dir.path().join(".gitignore").exists());
    }
}

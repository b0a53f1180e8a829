//! Tracked-pair discovery.
//!
//! Walks the configured include directories under an explicit project
//! root, applies the exclude rules, and produces the authoritative,
//! sorted list of tracked pairs for one invocation. The list is never
//! cached across invocations.
//!
//! Pairs come from two directions: plaintext files matching the include
//! patterns, and existing vault files whose plaintext may be missing.
//! Both collapse onto the same source-path key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::ProjectConfig;
use vaultsync_common::{Result, TrackedPair};

/// Discover all tracked pairs for `root` under the given configuration.
pub fn discover_pairs(root: &Path, config: &ProjectConfig) -> Result<Vec<TrackedPair>> {
    let suffix = &config.options.suffix;
    let mut pairs: BTreeMap<PathBuf, TrackedPair> = BTreeMap::new();

    for dir in &config.include_directories {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }

        let walker = WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_excluded_dir(entry.path(), &config.exclude_directories));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(suffix.as_str()) {
                if let Some(pair) = TrackedPair::from_vault(path, suffix) {
                    pairs.entry(pair.source.clone()).or_insert(pair);
                }
            } else if matches_any(&config.include_patterns, name)
                && !matches_any(&config.exclude_patterns, name)
            {
                let pair = TrackedPair::from_source(path, suffix);
                pairs.entry(pair.source.clone()).or_insert(pair);
            }
        }
    }

    let pairs: Vec<_> = pairs.into_values().collect();
    debug!(count = pairs.len(), root = %root.display(), "discovered tracked pairs");
    Ok(pairs)
}

fn is_excluded_dir(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|ex| {
        path.components()
            .any(|component| component.as_os_str() == ex.as_os_str())
    })
}

fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|p| glob_match(p, name))
}

/// Shell-style filename match supporting `*` and `?`.
///
/// The pack has no glob dependency small enough for this; the classic
/// backtracking scan is a handful of lines and covers the patterns the
/// configuration format documents.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ni < name.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == name[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some(pi);
            mark = ni;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ni = mark;
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

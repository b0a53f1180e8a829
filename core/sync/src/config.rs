//! Project configuration loading and validation.
//!
//! The configuration lives in `.vaultsync.toml` at the project root, with
//! fallbacks in the user config directory and `/etc/vaultsync/config.toml`.
//! Mode flags (force direction, rekey) never come from here — they are
//! explicit values passed in by the caller — and the project root is
//! threaded through every call rather than read from the process cwd.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use vaultsync_common::{Error, Result};

/// Configuration file name looked up in the project root.
pub const CONFIG_FILENAME: &str = ".vaultsync.toml";

/// Wrapper for the documented layout with a top-level `[vaultsync]` table.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    vaultsync: ProjectConfig,
}

/// File discovery and key settings for one project.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Directories to search for tracked files, relative to the root.
    #[serde(default = "default_include_directories")]
    pub include_directories: Vec<PathBuf>,
    /// Directory names excluded from the search.
    #[serde(default)]
    pub exclude_directories: Vec<PathBuf>,
    /// Filename patterns (`*`, `?`) selecting plaintext sources.
    pub include_patterns: Vec<String>,
    /// Filename patterns excluded even when an include pattern matches.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub options: Options,
}

/// The `[vaultsync.options]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    /// Path of the key file, resolved against the project root if relative.
    pub key_file: PathBuf,
    /// Suffix appended to a source path to name its vault file.
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_include_directories() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_suffix() -> String {
    ".vault".to_string()
}

impl ProjectConfig {
    /// Parse and validate a configuration file.
    ///
    /// Both the documented `[vaultsync]` table layout and a flat top-level
    /// layout are accepted.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        let mut config = toml::from_str::<ConfigFile>(&text)
            .map(|file| file.vaultsync)
            .or_else(|outer| {
                toml::from_str::<ProjectConfig>(&text).map_err(|_| {
                    Error::Config(format!("invalid configuration in {}: {outer}", path.display()))
                })
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Locate and load the configuration for `root`.
    ///
    /// Search order: `<root>/.vaultsync.toml`, then
    /// `<user config dir>/vaultsync/config.toml`, then
    /// `/etc/vaultsync/config.toml`.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidates = [
            Some(root.join(CONFIG_FILENAME)),
            dirs::config_dir().map(|d| d.join("vaultsync").join("config.toml")),
            Some(PathBuf::from("/etc/vaultsync/config.toml")),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }

        Err(Error::Config(format!(
            "no configuration found: create {} in {}",
            CONFIG_FILENAME,
            root.display()
        )))
    }

    /// Key file path resolved against the project root.
    pub fn key_file(&self, root: &Path) -> PathBuf {
        if self.options.key_file.is_absolute() {
            self.options.key_file.clone()
        } else {
            root.join(&self.options.key_file)
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.include_patterns.is_empty() {
            return Err(Error::Config(
                "'include_patterns' cannot be empty - at least one pattern is required".to_string(),
            ));
        }
        if self.options.key_file.as_os_str().is_empty() {
            return Err(Error::Config("'options.key_file' cannot be empty".to_string()));
        }

        let suffix = &self.options.suffix;
        if !suffix.contains('.') {
            return Err(Error::Config(format!(
                "suffix '{suffix}' must contain a dot (e.g. .vault, _prod.vault)"
            )));
        }
        // A suffix like "prod.vault" would silently merge with the source
        // file's extension; give it a separator.
        if !suffix.starts_with('.') && !suffix.starts_with('_') {
            self.options.suffix = format!("_{suffix}");
        }

        Ok(())
    }
}

//! VaultSync CLI - keep secret files in version control as encrypted vaults.
//!
//! Every command resolves the project configuration, discovers the
//! tracked pairs for this invocation, and hands explicit options to the
//! core crates; nothing is read from ambient process state beyond the
//! flags given here.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use vaultsync_common::TrackedPair;
use vaultsync_sync::{
    config::ProjectConfig, discover_pairs, gitignore, remove_vaults, rotate_key, SyncMode,
    SyncOptions, SyncReport, Synchronizer,
};
use vaultsync_vault::keyfile;

#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(about = "VaultSync - encrypted companions for secret files in version control")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root directory.
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Explicit configuration file (defaults to the standard search order).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum number of files processed in parallel.
    #[arg(long, default_value_t = 8, global = true)]
    jobs: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt tracked plaintext files into their vault companions.
    Encrypt {
        /// Re-encrypt even files whose content has not changed.
        #[arg(long)]
        force: bool,
    },

    /// Restore plaintext files from their vaults.
    Refresh {
        /// Only restore missing plaintext; never overwrite existing files.
        #[arg(long)]
        no_force: bool,
    },

    /// Delete all vault files matching the configured suffix.
    Remove,

    /// Verify that every tracked plaintext file is listed in .gitignore.
    CheckIgnore,

    /// Rotate the key: restore, purge, back up, reissue, re-encrypt.
    Rekey,

    /// Generate the configured key file.
    Keygen {
        /// Overwrite an existing key file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("project root {} not found", cli.root.display()))?;

    let config = match &cli.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::discover(&root)?,
    };
    let key_path = config.key_file(&root);
    let pairs = discover_pairs(&root, &config)?;

    match cli.command {
        Commands::Encrypt { force } => {
            let sources: Vec<_> = pairs
                .iter()
                .filter(|p| p.source.is_file())
                .map(|p| p.source.clone())
                .collect();
            gitignore::ensure_ignored(&root, &sources)?;

            let mode = if force {
                SyncMode::ForceEncrypt
            } else {
                SyncMode::Auto
            };
            let report = synchronizer(&key_path, mode, cli.jobs)?
                .run(pairs)
                .await;
            finish(report)
        }

        Commands::Refresh { no_force } => {
            // Refresh only ever works from existing vaults.
            let vault_pairs: Vec<TrackedPair> = pairs
                .into_iter()
                .filter(|p| p.vault.is_file())
                .filter(|p| !no_force || !p.source.is_file())
                .collect();

            let mode = if no_force {
                SyncMode::Auto
            } else {
                SyncMode::ForceRefresh
            };
            let report = synchronizer(&key_path, mode, cli.jobs)?
                .run(vault_pairs)
                .await;
            finish(report)
        }

        Commands::Remove => {
            let report = remove_vaults(pairs, cli.jobs).await;
            finish(report)
        }

        Commands::CheckIgnore => {
            let sources: Vec<_> = pairs
                .iter()
                .filter(|p| p.source.is_file())
                .map(|p| p.source.clone())
                .collect();
            let missing = gitignore::check_ignored(&root, &sources)?;
            if missing.is_empty() {
                println!("all tracked plaintext files are ignored");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("the following plaintext files are not ignored by git:");
                for entry in missing {
                    eprintln!(" - {entry}");
                }
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Rekey => {
            let outcome = rotate_key(&key_path, &pairs, cli.jobs).await?;
            println!(
                "rotation complete: {} restored, {} purged, {} re-encrypted",
                outcome.restored, outcome.removed, outcome.reencrypted
            );
            println!("old key backed up at {}", outcome.backup_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Keygen { force } => {
            if key_path.exists() && !force {
                bail!(
                    "key file {} already exists (use --force to overwrite)",
                    key_path.display()
                );
            }
            let (_, receipt) = keyfile::generate(&key_path)?;
            println!("wrote key file {}", receipt.path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn synchronizer(key_path: &Path, mode: SyncMode, jobs: usize) -> Result<Synchronizer> {
    let material = keyfile::load(key_path)?;
    let options = SyncOptions {
        mode,
        max_parallel: jobs,
    };
    Ok(Synchronizer::new(&material, options)?)
}

/// Print the batch report with full causal chains and map it to an exit
/// code: per-file failures never panic the process, they fail it.
fn finish(report: SyncReport) -> Result<ExitCode> {
    println!("{report}");
    if report.is_clean() {
        return Ok(ExitCode::SUCCESS);
    }
    for (path, error) in &report.failures {
        eprintln!("error: {}: {error}", path.display());
        let mut cause = std::error::Error::source(error);
        while let Some(err) = cause {
            eprintln!("  caused by: {err}");
            cause = err.source();
        }
    }
    Ok(ExitCode::FAILURE)
}

//! VaultSync synchronization engine.
//!
//! This crate ties the crypto and vault layers to a project tree:
//! - Project configuration loading and validation
//! - Tracked-pair discovery (include/exclude directories and patterns)
//! - The checksum-driven synchronizer that decides, per pair, whether to
//!   encrypt, restore, or skip
//! - The five-phase key rotation transaction
//! - `.gitignore` maintenance for discovered plaintext files

pub mod config;
pub mod discover;
pub mod engine;
pub mod gitignore;
pub mod report;
pub mod rotate;

pub use config::ProjectConfig;
pub use discover::discover_pairs;
pub use engine::{decide, remove_vaults, PairState, SyncAction, SyncMode, SyncOptions, Synchronizer};
pub use report::{FileOutcome, SyncReport};
pub use rotate::{rotate_key, RekeyOutcome};

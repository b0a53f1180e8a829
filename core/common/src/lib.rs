//! Common types shared across VaultSync modules.
//!
//! This crate provides the error taxonomy and the tracked-pair type that
//! every other VaultSync crate builds on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::TrackedPair;

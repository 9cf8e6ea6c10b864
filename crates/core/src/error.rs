// SPDX-License-Identifier: MIT

//! Error types for the core data model.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by `octo-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid integer for {name}: {value}")]
    InvalidInt { name: &'static str, value: String },
    #[error("invalid duration for {name}: {value}")]
    InvalidDuration { name: &'static str, value: String },
    #[error("candidate collector is not executable: {0}")]
    NotExecutable(PathBuf),
    #[error(
        "two collectors named {name} with different intervals ({existing} and {found})"
    )]
    IntervalCollision {
        name: String,
        existing: u64,
        found: u64,
    },
    #[error("evict_interval ({evict}) must be greater than dedup_interval ({dedup})")]
    EvictNotGreaterThanDedup { evict: u64, dedup: u64 },
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },
}

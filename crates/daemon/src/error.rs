// SPDX-License-Identifier: MIT

//! Errors that can abort daemon startup. Anything past startup is logged
//! and swallowed at the worker boundary instead (see `octo-engine`).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] octo_core::CoreError),
    #[error("another octopusd is already running (pid file locked at {0})")]
    AlreadyRunning(PathBuf),
    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),
}

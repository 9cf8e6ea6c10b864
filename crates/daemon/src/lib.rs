// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! octo-daemon: process wiring for the `octopusd` binary — logging,
//! configuration, the PID file, and graceful shutdown sequencing. The
//! supervision logic itself lives in `octo-engine`.

pub mod error;
pub mod logging;
pub mod pidfile;
pub mod shutdown;
pub mod sinks;

pub use error::DaemonError;
pub use pidfile::PidFile;
pub use shutdown::Shutdown;

// SPDX-License-Identifier: MIT

//! Error types for the scheduling engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("core error: {0}")]
    Core(#[from] octo_core::CoreError),
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan collector directory {path}: {source}")]
    Scan {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sink error: {0}")]
    Sink(#[from] octo_adapters::SinkError),
}

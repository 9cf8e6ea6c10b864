// SPDX-License-Identifier: MIT

//! The `Sink` trait: a pluggable destination for surviving metric lines.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error writing to sink: {0}")]
    Io(#[from] std::io::Error),
}

/// A downstream consumer of collector output lines, one line at a time.
///
/// Implementations must be cheap to clone/share (sinks are held behind
/// `Arc` and invoked from the sender task for every surviving line).
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    async fn send(&self, line: &str) -> Result<(), SinkError>;

    /// A short identifier used in logs (not necessarily unique).
    fn name(&self) -> &str;
}

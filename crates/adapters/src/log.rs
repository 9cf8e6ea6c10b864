// SPDX-License-Identifier: MIT

//! Emits each surviving line through `tracing`, for deployments that ship
//! logs rather than open a second outbound transport.

use async_trait::async_trait;

use crate::sink::{Sink, SinkError};

#[derive(Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn send(&self, line: &str) -> Result<(), SinkError> {
        tracing::info!(target: "octopus::sink::log", "{line}");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

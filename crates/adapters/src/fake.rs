// SPDX-License-Identifier: MIT

//! Test-only sink that records every line it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::sink::{Sink, SinkError};

#[derive(Clone, Default)]
pub struct FakeSink {
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Sink for FakeSink {
    async fn send(&self, line: &str) -> Result<(), SinkError> {
        self.received.lock().push(line.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_lines_in_order() {
        let sink = FakeSink::new();
        sink.send("a").await.unwrap();
        sink.send("b").await.unwrap();
        assert_eq!(sink.received(), vec!["a".to_string(), "b".to_string()]);
    }
}

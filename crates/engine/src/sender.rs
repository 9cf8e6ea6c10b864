// SPDX-License-Identifier: MIT

//! Dequeues lines and fans them out to every configured sink. A failing
//! sink is logged and does not interrupt the other sinks or the loop.

use std::sync::Arc;
use std::time::Duration;

use octo_adapters::Sink;
use octo_core::QueueConsumer;

/// Block on the queue until `timeout` elapses with nothing to send, or a
/// shutdown is requested. Returns once the queue reports closed.
pub async fn run(mut queue: QueueConsumer, sinks: Vec<Arc<dyn Sink>>, poll_timeout: Duration, shutdown: Arc<tokio::sync::Notify>) {
    loop {
        tokio::select! {
            line = queue.get(poll_timeout) => {
                if let Some(line) = line {
                    dispatch(&sinks, &line).await;
                }
            }
            _ = shutdown.notified() => {
                while let Some(line) = queue.get(Duration::from_millis(50)).await {
                    dispatch(&sinks, &line).await;
                }
                return;
            }
        }
    }
}

async fn dispatch(sinks: &[Arc<dyn Sink>], line: &str) {
    for sink in sinks {
        if let Err(e) = sink.send(line).await {
            tracing::warn!(sink = sink.name(), error = %e, "sink error, continuing");
        }
    }
}

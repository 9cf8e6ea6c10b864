// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! octo-adapters: pluggable sink implementations behind the `Sink` trait.

mod log;
mod sink;
mod stdout;

pub use log::LogSink;
pub use sink::{Sink, SinkError};
pub use stdout::StdoutSink;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSink;

/// Resolve a configured sink identifier to a constructor. Replaces runtime
/// string-to-type resolution with a small compile-time table.
pub fn resolve(identifier: &str) -> Option<std::sync::Arc<dyn Sink>> {
    match identifier {
        "stdout" => Some(std::sync::Arc::new(StdoutSink::new())),
        "log" => Some(std::sync::Arc::new(LogSink)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_identifiers() {
        assert!(resolve("stdout").is_some());
        assert!(resolve("log").is_some());
    }

    #[test]
    fn resolve_unknown_identifier_is_none() {
        assert!(resolve("kafka").is_none());
    }
}

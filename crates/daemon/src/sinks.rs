// SPDX-License-Identifier: MIT

//! Resolves `Settings::send_middlewares` into the ordered sink list the
//! sender dispatches to.

use std::sync::Arc;

use octo_adapters::Sink;

pub fn resolve_all(identifiers: &[String]) -> Vec<Arc<dyn Sink>> {
    identifiers
        .iter()
        .filter_map(|id| match octo_adapters::resolve(id) {
            Some(sink) => Some(sink),
            None => {
                tracing::warn!(identifier = %id, "unknown sink identifier, skipping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_identifiers_are_skipped_not_fatal() {
        let sinks = resolve_all(&["stdout".to_string(), "bogus".to_string()]);
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "stdout");
    }
}

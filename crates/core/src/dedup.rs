// SPDX-License-Identifier: MIT

//! Consecutive-duplicate suppression cache.
//!
//! Keyed by the `(metric, tag-set)` fingerprint (see [`crate::line::fingerprint`]).
//! Suppresses a repeated identical value until `dedup_interval` seconds have
//! elapsed since it was first seen, at which point a synthesized line
//! carrying the current timestamp is forwarded so downstream consumers still
//! see a continuous timeseries.

use std::collections::HashMap;

/// One cached value for a given dedup key.
#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub value: String,
    pub repeated: bool,
    pub last_line: String,
    pub first_seen: u64,
}

/// What the dedup filter decided to do with an incoming sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// First sighting, or a value change: forward the line as-is.
    Forward(String),
    /// Repeat within `dedup_interval`: suppress.
    Suppress,
    /// Repeat past `dedup_interval`: forward a synthesized line with `now`
    /// as its timestamp so the series doesn't appear to have a gap.
    ForwardRefreshed(String),
}

#[derive(Debug, Clone, Default)]
pub struct DedupCache {
    entries: HashMap<String, DedupEntry>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Evaluate dedup policy for one sample and update the cache.
    ///
    /// `metric`/`value`/`tags` are the parsed components used to compute the
    /// key; `line` is the raw (trimmed) line to forward or re-stamp;
    /// `new_timestamp` is used when synthesizing a refreshed line.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &mut self,
        key: String,
        value: &str,
        line: &str,
        now: u64,
        new_timestamp: i64,
        dedup_interval: u64,
    ) -> DedupDecision {
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(
                    key,
                    DedupEntry {
                        value: value.to_string(),
                        repeated: false,
                        last_line: line.to_string(),
                        first_seen: now,
                    },
                );
                DedupDecision::Forward(line.to_string())
            }
            Some(entry) if entry.value == value => {
                if now.saturating_sub(entry.first_seen) < dedup_interval {
                    entry.repeated = true;
                    entry.last_line = line.to_string();
                    DedupDecision::Suppress
                } else {
                    entry.first_seen = now;
                    entry.repeated = false;
                    let refreshed = restamp_line(line, new_timestamp);
                    entry.last_line = refreshed.clone();
                    DedupDecision::ForwardRefreshed(refreshed)
                }
            }
            Some(entry) => {
                entry.value = value.to_string();
                entry.repeated = false;
                entry.last_line = line.to_string();
                entry.first_seen = now;
                DedupDecision::Forward(line.to_string())
            }
        }
    }

    /// Remove entries first seen before `cutoff`. Idempotent.
    pub fn evict_old_keys(&mut self, cutoff: u64) {
        self.entries.retain(|_, entry| entry.first_seen >= cutoff);
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace the timestamp field (second whitespace-delimited token after the
/// metric, i.e. the third field overall) with `new_timestamp`.
fn restamp_line(line: &str, new_timestamp: i64) -> String {
    let mut fields = line.split_whitespace();
    let metric = fields.next().unwrap_or_default();
    let value = fields.next().unwrap_or_default();
    let rest: Vec<&str> = fields.collect();
    let mut out = format!("{metric} {value} {new_timestamp}");
    for tag in rest {
        out.push(' ');
        out.push_str(tag);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_forwards_and_caches() {
        let mut cache = DedupCache::new();
        let d = cache.observe("m".into(), "1", "m 1 100", 100, 100, 300);
        assert_eq!(d, DedupDecision::Forward("m 1 100".into()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn repeat_within_interval_is_suppressed() {
        let mut cache = DedupCache::new();
        cache.observe("m".into(), "1", "m 1 100", 100, 100, 300);
        let d = cache.observe("m".into(), "1", "m 1 150", 150, 150, 300);
        assert_eq!(d, DedupDecision::Suppress);
    }

    #[test]
    fn repeat_past_interval_forwards_restamped_line_and_resets_window() {
        let mut cache = DedupCache::new();
        cache.observe("m".into(), "1", "m 1 100", 100, 100, 300);
        let d = cache.observe("m".into(), "1", "m 1 500", 500, 500, 300);
        assert_eq!(d, DedupDecision::ForwardRefreshed("m 1 500".into()));
        // window reset: immediate repeat now suppresses again
        let d2 = cache.observe("m".into(), "1", "m 1 550", 550, 550, 300);
        assert_eq!(d2, DedupDecision::Suppress);
    }

    #[test]
    fn value_change_forwards_and_resets_first_seen() {
        let mut cache = DedupCache::new();
        cache.observe("m".into(), "1", "m 1 100", 100, 100, 300);
        let d = cache.observe("m".into(), "2", "m 2 150", 150, 150, 300);
        assert_eq!(d, DedupDecision::Forward("m 2 150".into()));
    }

    #[test]
    fn evict_old_keys_removes_only_stale_entries() {
        let mut cache = DedupCache::new();
        cache.observe("old".into(), "1", "old 1 0", 0, 0, 300);
        cache.observe("fresh".into(), "1", "fresh 1 1000", 1000, 1000, 300);
        cache.evict_old_keys(500);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn restamp_preserves_tags() {
        assert_eq!(restamp_line("m 1 100 a=b c=d", 200), "m 1 200 a=b c=d");
    }
}

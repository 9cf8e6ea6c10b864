// SPDX-License-Identifier: MIT

//! Drains live children's output, applies dedup, and hands surviving lines
//! off to the queue. Runs on its own cadence, independent of the
//! supervisor's tick.

use std::time::SystemTime;

use octo_core::{fingerprint, parse_line, Collector, DedupDecision, QueueProducer};
use octo_core::{PutOutcome, Registry};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One pass over every live collector: drain its output, dedup, enqueue.
pub fn drain_once(registry: &mut Registry, queue: &QueueProducer, dedup_interval: u64, dedup_only_zero: bool) {
    for collector in registry.all_living_mut() {
        flush_one(collector, queue, dedup_interval, dedup_only_zero);
    }
}

/// Drain, dedup, and enqueue whatever output a single collector has already
/// produced. Shared by the reader's own cadence and by the process manager,
/// which must flush a child's last output before tearing down its channels
/// on reap — otherwise anything buffered since the reader's last pass is
/// silently lost when `clear_process` drops the channels.
pub fn flush_one(collector: &mut Collector, queue: &QueueProducer, dedup_interval: u64, dedup_only_zero: bool) {
    let now = now_secs();

    for raw_line in collector.collect() {
        let Some(parsed) = parse_line(&raw_line) else {
            collector.lines_invalid += 1;
            continue;
        };

        let skip_dedup = dedup_only_zero && parsed.value_f64 != Some(0.0);
        let decision = if skip_dedup {
            DedupDecision::Forward(raw_line.clone())
        } else {
            let key = fingerprint(parsed.metric, &parsed.tags);
            collector.dedup_mut().observe(
                key,
                parsed.value,
                &raw_line,
                now,
                parsed.timestamp,
                dedup_interval,
            )
        };

        let forwarded = match decision {
            DedupDecision::Suppress => None,
            DedupDecision::Forward(line) | DedupDecision::ForwardRefreshed(line) => Some(line),
        };

        if let Some(line) = forwarded {
            match queue.put(line) {
                PutOutcome::Accepted => collector.lines_sent += 1,
                PutOutcome::Dropped => {
                    collector.lines_dropped += 1;
                    tracing::warn!(name = %collector.name, "queue full, dropping line");
                }
            }
        }
    }
}

/// Periodic sweep: remove dedup entries older than `evict_interval` across
/// every collector. Called by the supervisor loop on its own cadence.
pub fn evict_stale_dedup_keys(registry: &mut Registry, evict_interval: u64) {
    let now = now_secs();
    let cutoff = now.saturating_sub(evict_interval);
    for collector in registry.iter_mut() {
        collector.evict_old_keys(cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_core::{bounded, Collector};
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn drain_once_forwards_first_sighting_and_suppresses_repeat() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            &dir,
            "c",
            "#!/bin/sh\necho 'm.x 1 1700000000'\necho 'm.x 1 1700000001'\nsleep 2\n",
        );
        let mut registry = Registry::new();
        registry
            .register(Collector::new("c".into(), 0, path, SystemTime::now(), 0))
            .unwrap();
        crate::process_manager::spawn(&mut registry).await;
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let (tx, mut rx) = bounded(16);
        drain_once(&mut registry, &tx, 300, false);

        let first = rx.get(std::time::Duration::from_millis(100)).await;
        assert_eq!(first, Some("m.x 1 1700000000".to_string()));
        let second = rx.get(std::time::Duration::from_millis(50)).await;
        assert_eq!(second, None, "duplicate value should have been suppressed");

        registry.get_mut("c").unwrap().shutdown().await;
    }

    #[test]
    fn drain_once_counts_malformed_lines_as_invalid() {
        // Exercised indirectly via parse_line; a descriptor with no live
        // process simply yields nothing to drain.
        let mut registry = Registry::new();
        registry
            .register(Collector::new(
                "c".into(),
                0,
                PathBuf::from("/bin/true"),
                SystemTime::now(),
                0,
            ))
            .unwrap();
        let (tx, _rx) = bounded(16);
        drain_once(&mut registry, &tx, 300, false);
        assert_eq!(registry.get("c").unwrap().lines_invalid, 0);
    }
}

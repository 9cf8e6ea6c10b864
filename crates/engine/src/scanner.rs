// SPDX-License-Identifier: MIT

//! Reconciles the on-disk collector directory tree with the registry.
//!
//! Directory layout: `<collector_dir>/<interval>/<name>`, where `<interval>`
//! is a non-negative decimal integer and `<name>` is an executable file not
//! starting with `.`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use octo_core::{Collector, CoreError, Registry};

use crate::error::EngineError;

/// A descriptor is considered deleted once its `generation` is this old.
const STALE_GENERATION_SECS: u64 = 30;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One executable candidate found under an interval subdirectory.
struct Candidate {
    name: String,
    interval: u64,
    path: PathBuf,
    mtime: SystemTime,
}

fn is_executable(metadata: &fs::Metadata) -> bool {
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

fn list_candidates(collector_dir: &Path) -> Result<Vec<Candidate>, EngineError> {
    let mut out = Vec::new();

    let entries = match fs::read_dir(collector_dir) {
        Ok(entries) => entries,
        Err(source) => {
            return Err(EngineError::Scan {
                path: collector_dir.to_path_buf(),
                source,
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Scan {
            path: collector_dir.to_path_buf(),
            source,
        })?;
        let interval_dir = entry.path();
        let Some(dir_name) = interval_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Ok(interval) = dir_name.parse::<u64>() else {
            continue;
        };
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        for file in fs::read_dir(&interval_dir).map_err(|source| EngineError::Scan {
            path: interval_dir.clone(),
            source,
        })? {
            let file = file.map_err(|source| EngineError::Scan {
                path: interval_dir.clone(),
                source,
            })?;
            let path = file.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = fs::metadata(&path).map_err(EngineError::from_io_for_scan(&path))?;
            if !is_executable(&metadata) {
                tracing::error!(path = %path.display(), "candidate collector is not executable");
                return Err(EngineError::Core(CoreError::NotExecutable(path)));
            }
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push(Candidate {
                name: name.to_string(),
                interval,
                path,
                mtime,
            });
        }
    }

    Ok(out)
}

/// Reconcile `collector_dir` against `registry`. Returns `Err` (without
/// mutating further) as soon as a non-executable candidate is found —
/// the whole pass is rejected, and the next tick retries from scratch.
pub async fn populate(registry: &mut Registry, collector_dir: &Path) -> Result<(), EngineError> {
    let now = now_secs();
    let candidates = list_candidates(collector_dir)?;

    for candidate in candidates {
        match registry.get(&candidate.name) {
            None => {
                let collector = Collector::new(
                    candidate.name.clone(),
                    candidate.interval,
                    candidate.path.clone(),
                    candidate.mtime,
                    now,
                );
                registry.register(collector)?;
            }
            Some(existing) if existing.interval != candidate.interval => {
                tracing::error!(
                    name = %candidate.name,
                    existing_interval = existing.interval,
                    found_interval = candidate.interval,
                    "duplicate collector name across intervals, ignoring"
                );
            }
            Some(existing) => {
                let mtime_advanced = candidate.mtime > existing.mtime;
                let is_long_running = candidate.interval == 0;
                let collector = registry.get_mut(&candidate.name).expect("just matched");
                collector.generation = now;
                if mtime_advanced {
                    collector.mtime = candidate.mtime;
                    if is_long_running && collector.is_alive() {
                        tracing::info!(name = %candidate.name, "collector updated on disk, restarting");
                        collector.shutdown().await;
                    }
                }
            }
        }
    }

    let stale: Vec<String> = registry
        .iter()
        .filter(|c| now.saturating_sub(c.generation) > STALE_GENERATION_SECS)
        .map(|c| c.name.clone())
        .collect();

    for name in stale {
        if let Some(mut collector) = registry.remove(&name) {
            tracing::info!(name = %name, "collector file disappeared, retiring");
            collector.shutdown().await;
        }
    }

    Ok(())
}

impl EngineError {
    fn from_io_for_scan(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError + '_ {
        move |source| EngineError::Scan {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_executable(dir: &Path, interval: &str, name: &str) -> PathBuf {
        let interval_dir = dir.join(interval);
        fs::create_dir_all(&interval_dir).unwrap();
        let path = interval_dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn populate_registers_new_collectors() {
        let dir = TempDir::new().unwrap();
        write_executable(dir.path(), "10", "ping");
        let mut registry = Registry::new();
        populate(&mut registry, dir.path()).await.unwrap();
        assert!(registry.contains("ping"));
        assert_eq!(registry.get("ping").unwrap().interval, 10);
    }

    #[tokio::test]
    async fn non_executable_candidate_rejects_the_whole_pass() {
        let dir = TempDir::new().unwrap();
        let interval_dir = dir.path().join("10");
        fs::create_dir_all(&interval_dir).unwrap();
        fs::write(interval_dir.join("notexec"), "echo hi").unwrap();
        let mut registry = Registry::new();
        let err = populate(&mut registry, dir.path()).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotExecutable(_))));
    }

    #[tokio::test]
    async fn hidden_and_nonnumeric_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_executable(dir.path(), "10", ".hidden");
        fs::create_dir_all(dir.path().join("notanumber")).unwrap();
        let mut registry = Registry::new();
        populate(&mut registry, dir.path()).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_different_interval_is_ignored_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_executable(dir.path(), "10", "dup");
        write_executable(dir.path(), "20", "dup");
        let mut registry = Registry::new();
        populate(&mut registry, dir.path()).await.unwrap();
        assert_eq!(registry.len(), 1);
    }
}

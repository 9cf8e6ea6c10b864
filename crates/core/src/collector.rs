// SPDX-License-Identifier: MIT

//! The collector descriptor: one in-memory record per executable collector
//! script, its schedule, its running child (if any), and its dedup cache.
//!
//! Spawning policy (when to start/stop/escalate) lives in `octo-engine`'s
//! process manager; this type only knows how to hold a running child, drain
//! whatever it has already produced, and shut it down.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::SystemTime;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::dedup::DedupCache;

/// Escalation state for a periodic collector whose previous run has
/// overstayed its `interval`. See `octo-engine`'s process manager for the
/// state transitions; this is just the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillState {
    #[default]
    NotEscalated,
    TermSent,
    KillSent,
}

/// A live child process plus the channels its output is streamed through.
///
/// Each stream is drained by its own task (`AsyncBufReadExt::lines`), which
/// is how the non-blocking read requirement is met: the supervisor/reader
/// never awaits on child I/O, it only drains whatever has already arrived.
struct RunningProcess {
    child: Child,
    pid: u32,
    stdout_rx: mpsc::UnboundedReceiver<String>,
    stderr_rx: mpsc::UnboundedReceiver<String>,
}

pub struct Collector {
    pub name: String,
    pub interval: u64,
    pub file_path: PathBuf,
    pub mtime: SystemTime,
    pub generation: u64,
    pub last_spawn: u64,
    pub last_datapoint: u64,
    pub kill_state: KillState,
    pub next_kill: u64,
    pub dead: bool,
    pub lines_sent: u64,
    pub lines_received: u64,
    pub lines_invalid: u64,
    pub lines_dropped: u64,
    dedup: DedupCache,
    proc: Option<RunningProcess>,
}

impl Collector {
    pub fn new(name: String, interval: u64, file_path: PathBuf, mtime: SystemTime, now: u64) -> Self {
        Self {
            name,
            interval,
            file_path,
            mtime,
            generation: now,
            last_spawn: 0,
            last_datapoint: now,
            kill_state: KillState::NotEscalated,
            next_kill: 0,
            dead: false,
            lines_sent: 0,
            lines_received: 0,
            lines_invalid: 0,
            lines_dropped: 0,
            dedup: DedupCache::new(),
            proc: None,
        }
    }

    /// Rebuild a descriptor after its child exited normally, preserving
    /// schedule-relevant fields (`last_spawn`) the way the source's
    /// `register_collector(Collector(col.name, ...))` reap path does.
    ///
    /// Unlike the source, the dedup cache is carried over rather than reset:
    /// a fresh cache here would make consecutive-value suppression across
    /// spawns of the same periodic collector structurally impossible, which
    /// contradicts the documented cross-spawn dedup behavior.
    pub fn respawned_after_normal_exit(&self, now: u64) -> Self {
        let mut fresh = Self::new(
            self.name.clone(),
            self.interval,
            self.file_path.clone(),
            self.mtime,
            now,
        )
        .with_last_spawn(self.last_spawn);
        fresh.dedup = self.dedup.clone();
        fresh
    }

    fn with_last_spawn(mut self, last_spawn: u64) -> Self {
        self.last_spawn = last_spawn;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.proc.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.proc.as_ref().map(|p| p.pid)
    }

    pub fn dedup_mut(&mut self) -> &mut DedupCache {
        &mut self.dedup
    }

    /// Take ownership of a freshly spawned child, wiring up the two
    /// line-draining tasks. Called by the process manager right after
    /// `tokio::process::Command::spawn()` succeeds.
    pub fn attach_process(&mut self, mut child: Child, pid: u32) {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = stdout {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let trimmed = line.trim();
                            if !trimmed.is_empty() && stdout_tx.send(trimmed.to_string()).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::debug!(collector = %name, error = %e, "stdout read error");
                            break;
                        }
                    }
                }
            });
        }

        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if stderr_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
            });
        }

        self.proc = Some(RunningProcess {
            child,
            pid,
            stdout_rx,
            stderr_rx,
        });
    }

    /// Check without blocking whether the child has exited.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.proc.as_mut() {
            Some(running) => running.child.try_wait(),
            None => Ok(None),
        }
    }

    /// Clear the process handle after `try_wait` reports an exit.
    pub fn clear_process(&mut self) {
        self.proc = None;
    }

    /// Drain whatever stderr lines have arrived, logging each at WARN
    /// prefixed by the collector name, and whatever stdout lines have
    /// arrived, returning them for dedup processing.
    ///
    /// Non-blocking and safe to call whether or not the child is still
    /// alive — this is the fix for the "poll() is None means alive"
    /// inversion: draining never depends on liveness, only on whether
    /// bytes have already landed in the channel.
    pub fn collect(&mut self) -> Vec<String> {
        let Some(running) = self.proc.as_mut() else {
            return Vec::new();
        };

        while let Ok(line) = running.stderr_rx.try_recv() {
            tracing::warn!(collector = %self.name, "{line}");
        }

        let mut out = Vec::new();
        while let Ok(line) = running.stdout_rx.try_recv() {
            self.last_datapoint = now_secs();
            self.lines_received += 1;
            out.push(line);
        }
        out
    }

    /// Cleanly shut down the child. Idempotent; never panics.
    ///
    /// Polls every second for up to 5s, then escalates to SIGKILL against
    /// the child's whole process group (it was spawned with its own
    /// session, see `octo-engine`'s process manager).
    pub async fn shutdown(&mut self) {
        let Some(mut running) = self.proc.take() else {
            return;
        };

        for attempt in (0..5).rev() {
            match running.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(collector = %self.name, error = %e, "error polling during shutdown");
                    return;
                }
            }
            tracing::info!(
                collector = %self.name,
                pid = running.pid,
                "waiting {}s for exit",
                attempt + 1
            );
            sleep(Duration::from_secs(1)).await;
        }

        if let Err(e) = signal::killpg(Pid::from_raw(running.pid as i32), Signal::SIGKILL) {
            tracing::debug!(collector = %self.name, pid = running.pid, error = %e, "killpg failed (process likely already gone)");
        }
        let _ = running.child.wait().await;
    }

    /// Remove dedup entries older than `cutoff`. Idempotent.
    pub fn evict_old_keys(&mut self, cutoff: u64) {
        self.dedup.evict_old_keys(cutoff);
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(name: &str, interval: u64) -> Collector {
        Collector::new(name.to_string(), interval, PathBuf::from("/bin/true"), SystemTime::now(), 1000)
    }

    #[test]
    fn new_collector_has_no_process() {
        let col = mk("c", 10);
        assert!(!col.is_alive());
        assert_eq!(col.pid(), None);
    }

    #[test]
    fn respawned_after_normal_exit_preserves_last_spawn_and_clears_state() {
        let mut col = mk("c", 10);
        col.last_spawn = 555;
        col.kill_state = KillState::KillSent;
        col.dead = true;
        let fresh = col.respawned_after_normal_exit(2000);
        assert_eq!(fresh.last_spawn, 555);
        assert_eq!(fresh.kill_state, KillState::NotEscalated);
        assert!(!fresh.dead);
        assert_eq!(fresh.generation, 2000);
    }

    #[test]
    fn respawned_after_normal_exit_carries_the_dedup_cache_forward() {
        let mut col = mk("c", 10);
        col.dedup_mut()
            .observe("m".into(), "1", "m 1 0", 0, 0, 300);
        let mut fresh = col.respawned_after_normal_exit(2000);
        assert_eq!(fresh.dedup_mut().len(), 1);
    }

    #[test]
    fn collect_on_dead_collector_returns_empty() {
        let mut col = mk("c", 10);
        assert!(col.collect().is_empty());
    }

    #[tokio::test]
    async fn shutdown_on_never_spawned_collector_is_a_noop() {
        let mut col = mk("c", 10);
        col.shutdown().await;
    }

    #[test]
    fn evict_old_keys_delegates_to_dedup_cache() {
        let mut col = mk("c", 10);
        col.dedup_mut()
            .observe("m".into(), "1", "m 1 0", 0, 0, 300);
        col.evict_old_keys(500);
        assert!(col.dedup_mut().is_empty());
    }
}

// SPDX-License-Identifier: MIT

//! Spawns children, reaps exited ones, and enforces the inactivity and
//! overrun timeouts defined in §4.4.

use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Stdio;
use std::time::SystemTime;

use octo_core::{Collector, KillState, QueueProducer, Registry, DEAD_QUARANTINE_SECS};
use tokio::process::Command;

use crate::reader;

const OVERRUN_FIRST_RETRY_SECS: u64 = 5;
const OVERRUN_MANUAL_RETRY_SECS: u64 = 300;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// For every descriptor with a live child, check whether it has exited and
/// apply the exit-status disposition from §4.4's reap table.
///
/// Flushes each exited child's output before tearing down its channels: the
/// reader runs on its own cadence, so without this flush anything already
/// buffered since its last pass would be dropped the instant `clear_process`
/// runs.
pub async fn reap(
    registry: &mut Registry,
    queue: &QueueProducer,
    dedup_interval: u64,
    dedup_only_zero: bool,
) {
    let names: Vec<String> = registry
        .iter()
        .filter(|c| c.is_alive())
        .map(|c| c.name.clone())
        .collect();

    for name in names {
        let Some(collector) = registry.get_mut(&name) else {
            continue;
        };
        let status = match collector.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "error polling child");
                continue;
            }
        };
        reader::flush_one(collector, queue, dedup_interval, dedup_only_zero);
        collector.clear_process();

        let now = now_secs();
        match status.code() {
            Some(0) => {
                let fresh = collector.respawned_after_normal_exit(now);
                registry.remove(&name);
                let _ = registry.register(fresh);
            }
            Some(13) => {
                tracing::info!(name = %name, "collector opted out (exit 13), quarantining");
                collector.dead = true;
            }
            Some(code) => {
                tracing::warn!(name = %name, code, "collector exited abnormally, quarantining");
                collector.dead = true;
            }
            None => {
                let signal = status.signal();
                tracing::warn!(name = %name, ?signal, "collector killed by signal, quarantining");
                collector.dead = true;
            }
        }
    }
}

/// Shut down and re-register any long-running collector that has produced
/// nothing for longer than `allowed_inactivity_time`, unless its name is on
/// the remove-inactive list.
pub async fn check_inactivity(
    registry: &mut Registry,
    allowed_inactivity_time: u64,
    remove_inactive: &std::collections::HashSet<String>,
) {
    let now = now_secs();
    let stuck: Vec<String> = registry
        .iter()
        .filter(|c| {
            c.interval == 0
                && c.is_alive()
                && now.saturating_sub(c.last_datapoint) > allowed_inactivity_time
        })
        .map(|c| c.name.clone())
        .collect();

    for name in stuck {
        let Some(collector) = registry.get_mut(&name) else {
            continue;
        };
        tracing::warn!(name = %name, "long-running collector inactive, restarting");
        collector.shutdown().await;
        if !remove_inactive.contains(&name) {
            let fresh = collector.respawned_after_normal_exit(now);
            registry.remove(&name);
            let _ = registry.register(fresh);
        }
    }
}

/// Spawn descriptors that are eligible to run, and drive the overrun
/// escalation state machine for periodic collectors whose previous run has
/// overstayed `interval`.
pub async fn spawn(registry: &mut Registry) {
    let now = now_secs();
    let names: Vec<String> = registry.all_valid().map(|c| c.name.clone()).collect();

    for name in names {
        let Some(collector) = registry.get_mut(&name) else {
            continue;
        };

        if collector.dead {
            if now.saturating_sub(collector.last_spawn) < DEAD_QUARANTINE_SECS {
                continue;
            }
            collector.dead = false;
        }

        let overstayed = collector.interval > 0
            && collector.is_alive()
            && collector.interval <= now.saturating_sub(collector.last_spawn);
        if overstayed {
            escalate(collector, now);
            continue;
        }

        let should_spawn = (collector.interval == 0 && !collector.is_alive())
            || (collector.interval > 0
                && !collector.is_alive()
                && collector.interval <= now.saturating_sub(collector.last_spawn));
        if !should_spawn {
            continue;
        }

        spawn_one(collector, now).await;
    }
}

fn escalate(collector: &mut Collector, now: u64) {
    if now < collector.next_kill {
        return;
    }
    let Some(pid) = collector.pid() else { return };

    match collector.kill_state {
        KillState::NotEscalated => {
            tracing::warn!(name = %collector.name, pid, "collector overran its interval, sending SIGTERM");
            if send_signal(pid, nix::sys::signal::Signal::SIGTERM).is_ok() {
                collector.kill_state = KillState::TermSent;
                collector.next_kill = now + OVERRUN_FIRST_RETRY_SECS;
            }
        }
        KillState::TermSent => {
            tracing::warn!(name = %collector.name, pid, "collector still alive after SIGTERM, sending SIGKILL");
            if send_signal(pid, nix::sys::signal::Signal::SIGKILL).is_ok() {
                collector.kill_state = KillState::KillSent;
                collector.next_kill = now + OVERRUN_FIRST_RETRY_SECS;
            }
        }
        KillState::KillSent => {
            tracing::error!(name = %collector.name, pid, "collector needs manual intervention");
            collector.next_kill = now + OVERRUN_MANUAL_RETRY_SECS;
        }
    }
}

fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), nix::Error> {
    nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid as i32), signal)
}

async fn spawn_one(collector: &mut Collector, now: u64) {
    let mut command = Command::new(&collector.file_path);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    match command.spawn() {
        Ok(mut child) => {
            let Some(pid) = child.id() else {
                tracing::warn!(name = %collector.name, "spawned child has no pid, dropping");
                let _ = child.start_kill();
                return;
            };
            collector.attach_process(child, pid);
            collector.last_spawn = now;
            collector.last_datapoint = now;
            collector.dead = false;
            collector.kill_state = KillState::NotEscalated;
            collector.next_kill = 0;
            tracing::info!(name = %collector.name, pid, "spawned collector");
        }
        Err(e) => {
            tracing::warn!(name = %collector.name, error = %e, "failed to spawn collector");
        }
    }
}

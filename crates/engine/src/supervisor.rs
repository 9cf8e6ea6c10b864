// SPDX-License-Identifier: MIT

//! The fixed-cadence driver: each tick runs populate → reap →
//! check_inactivity → spawn. The reader runs concurrently on its own,
//! faster cadence. Both observe the shared shutdown signal at their sleep
//! boundaries.

use std::sync::Arc;
use std::time::Duration;

use octo_core::{QueueProducer, Registry, Settings};
use tokio::sync::{Mutex, Notify};

use crate::{process_manager, reader, scanner};

const READER_CADENCE: Duration = Duration::from_secs(1);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(600);

/// Drive the supervisor and reader loops until `shutdown` is notified.
/// Shuts every live collector down before returning.
pub async fn run(
    registry: Arc<Mutex<Registry>>,
    queue: QueueProducer,
    settings: Arc<Settings>,
    shutdown: Arc<Notify>,
) {
    let reader_handle = tokio::spawn(reader_loop(
        registry.clone(),
        queue.clone(),
        settings.clone(),
        shutdown.clone(),
    ));

    let mut heartbeat_elapsed = Duration::ZERO;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(settings.tick_interval) => {
                tick(&registry, &queue, &settings).await;
                heartbeat_elapsed += settings.tick_interval;
                if heartbeat_elapsed >= HEARTBEAT_INTERVAL {
                    heartbeat_elapsed = Duration::ZERO;
                    let reg = registry.lock().await;
                    let live = reg.iter().filter(|c| c.is_alive()).count();
                    tracing::info!(live, "heartbeat");
                }
            }
            _ = shutdown.notified() => {
                tracing::info!("shutdown requested, draining collectors");
                let mut reg = registry.lock().await;
                let names: Vec<String> = reg.iter().map(|c| c.name.clone()).collect();
                for name in names {
                    if let Some(collector) = reg.get_mut(&name) {
                        collector.shutdown().await;
                    }
                }
                break;
            }
        }
    }

    let _ = reader_handle.await;
}

async fn tick(registry: &Arc<Mutex<Registry>>, queue: &QueueProducer, settings: &Settings) {
    let mut reg = registry.lock().await;
    if let Err(e) = scanner::populate(&mut reg, &settings.collector_dir).await {
        tracing::error!(error = %e, "scan pass rejected, retrying next tick");
    }
    process_manager::reap(&mut reg, queue, settings.dedup_interval, settings.dedup_only_zero).await;
    process_manager::check_inactivity(
        &mut reg,
        settings.allowed_inactivity_time.as_secs(),
        &settings.remove_inactive_collectors,
    )
    .await;
    process_manager::spawn(&mut reg).await;
}

async fn reader_loop(
    registry: Arc<Mutex<Registry>>,
    queue: QueueProducer,
    settings: Arc<Settings>,
    shutdown: Arc<Notify>,
) {
    let mut evict_elapsed = Duration::ZERO;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(READER_CADENCE) => {
                let mut reg = registry.lock().await;
                reader::drain_once(&mut reg, &queue, settings.dedup_interval, settings.dedup_only_zero);
                evict_elapsed += READER_CADENCE;
                if evict_elapsed.as_secs() >= settings.evict_interval {
                    evict_elapsed = Duration::ZERO;
                    reader::evict_stale_dedup_keys(&mut reg, settings.evict_interval);
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

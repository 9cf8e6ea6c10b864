// SPDX-License-Identifier: MIT

//! octopusd — host-resident metrics collector supervisor.
//!
//! Discovers executable collector scripts under `Settings::collector_dir`,
//! runs them on their declared schedules, and forwards surviving output
//! lines to the configured sinks.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::sync::Arc;

use octo_core::{bounded, Registry, Settings};
use octo_daemon::{sinks, PidFile, Shutdown};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("octopusd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("octopusd {}", env!("CARGO_PKG_VERSION"));
                println!("Metrics collector supervisor.");
                println!();
                println!("USAGE:");
                println!("    octopusd");
                println!();
                println!("Configuration is read from the environment (BASE_DIR,");
                println!("ALLOWED_INACTIVITY_TIME, MAX_READ_QUEUE_SIZE, SEND_MIDDLEWARES, ...).");
                println!("See the project README for the full list.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("usage: octopusd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let settings = Settings::from_env()?;
    let _log_guard = octo_daemon::logging::init(&settings.log_path)?;

    info!("starting octopusd");

    let _pid_file = PidFile::acquire(&settings.pid_path).map_err(|e| {
        error!(error = %e, "failed to acquire pid file");
        e
    })?;

    let sinks = sinks::resolve_all(&settings.send_middlewares);
    if sinks.is_empty() {
        tracing::warn!("no sinks configured, collected lines will be dropped at the sender");
    }

    let registry = Arc::new(Mutex::new(Registry::new()));
    let (queue_producer, queue_consumer) = bounded(settings.max_read_queue_size);
    let settings = Arc::new(settings);
    let shutdown = Shutdown::new();

    let sender_handle = tokio::spawn(octo_engine::sender::run(
        queue_consumer,
        sinks,
        std::time::Duration::from_secs(1),
        shutdown.notify_handle(),
    ));

    let supervisor_handle = tokio::spawn(octo_engine::supervisor::run(
        registry,
        queue_producer,
        settings,
        shutdown.notify_handle(),
    ));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    info!("shutting down");
    shutdown.request();

    let _ = supervisor_handle.await;
    let _ = sender_handle.await;

    info!("octopusd stopped");
    Ok(())
}

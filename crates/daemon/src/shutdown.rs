// SPDX-License-Identifier: MIT

//! Shared shutdown signal observed by the supervisor, reader, and sender at
//! their loop boundaries: an `AtomicBool` for a point-in-time check, plus a
//! `Notify` to wake anything currently sleeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

pub struct Shutdown {
    requested: AtomicBool,
    notify: Arc<Notify>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self {
            requested: AtomicBool::new(false),
            notify: Arc::new(Notify::new()),
        }
    }
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// A cloneable `Notify` handle for workers that only need to wait on
    /// the signal, not query it. Workers (octo-engine) hold this instead
    /// of `Arc<Shutdown>` to keep their API surface decoupled from the
    /// daemon's shutdown type.
    pub fn notify_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}

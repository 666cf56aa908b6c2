// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sps30 project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Cooperative cancellation
//!
//! The agent runs on a single thread and spends most of its life in blocking
//! delays. A [`CancellationToken`] lets a signal handler (or a test) stop it
//! cleanly: every delay is sliced and checks the token in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep inside [`CancellationToken::sleep`]
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared stop flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// token was (or became) cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Cancel this token when the process receives SIGINT or SIGTERM
    pub fn cancel_on_signal(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            token.cancel();
        })
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock time as milliseconds since the Unix epoch.
//!
//! Heartbeat ages, pending enqueue times, and the watchdog threshold are all
//! millisecond comparisons, and the same value rides in heartbeat payloads,
//! so the seam exposes a single `epoch_ms` and carries no monotonic
//! `Instant` handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time, injectable for tests.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

/// Clock backed by the system wall clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        // A clock before 1970 reads as 0 rather than failing
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-cranked clock shared by clones, for driving watchdog and back-off
/// tests without sleeping.
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(AtomicU64::new(1_000_000)) }
    }

    /// Crank time forward, e.g. past the heartbeat staleness threshold
    /// between watchdog sweeps.
    pub fn advance(&self, duration: Duration) {
        self.epoch_ms.fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Pin the clock to an exact timestamp.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.epoch_ms.store(ms, Ordering::Relaxed);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle: configuration, startup, shutdown cleanup.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use fs2::FileExt;
use foreman_core::SystemClock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::journal::{JournalError, PendingJournal};
use crate::probe::PsSchedProbe;
use crate::spawn::{ProcessSpawner, SpawnError};
use crate::supervisor::{Supervisor, SupervisorEvent};
use foreman_core::Clock;

/// Supervisor runtime with concrete adapter types
pub type DaemonSupervisor = Supervisor<ProcessSpawner, PsSchedProbe, SystemClock>;

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/foreman)
    pub state_dir: PathBuf,
    /// Directory holding per-worker channel sockets
    pub sockets_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to the supervisor log file
    pub log_path: PathBuf,
    /// Path to the pending journal
    pub journal_path: PathBuf,
    /// Worker binary the spawn engine launches
    pub worker_bin: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            sockets_dir: state_dir.join("workers"),
            lock_path: state_dir.join("supervisord.pid"),
            log_path: state_dir.join("supervisor.log"),
            journal_path: state_dir.join("journal").join("pending.jsonl"),
            worker_bin: crate::env::worker_bin(),
            state_dir,
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: supervisor already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of supervisor startup.
pub struct StartupResult {
    pub supervisor: DaemonSupervisor,
    pub events: mpsc::Receiver<SupervisorEvent>,
    // NOTE(lifetime): held to maintain the exclusive file lock; released on drop
    pub lock_file: File,
}

/// Acquire the lock, replay the journal, and build the engine.
///
/// The fleet is not spawned here; the caller runs `boot()` once it is ready
/// to process events.
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.sockets_dir)?;

    let lock_file = acquire_lock(config)?;

    let clock = SystemClock;
    let (journal, pending) = PendingJournal::open(&config.journal_path, clock.epoch_ms())?;
    if !pending.is_empty() {
        info!("journal replay recovered in-flight messages");
    }

    let spawner = ProcessSpawner::new(
        config.worker_bin.clone(),
        config.sockets_dir.clone(),
        crate::env::channel_accept_timeout(),
    );
    let (supervisor, events) = Supervisor::new(
        spawner,
        PsSchedProbe,
        clock,
        crate::env::fleet(),
        pending,
        Some(journal),
    );

    Ok(StartupResult { supervisor, events, lock_file })
}

/// Remove runtime files after the engine has shut down.
///
/// The lock file is unlocked by dropping the handle; this removes the stale
/// PID file and any leftover channel sockets.
pub fn cleanup(config: &Config) {
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!(error = %e, "failed to remove PID file");
        }
    }
    if let Ok(entries) = std::fs::read_dir(&config.sockets_dir) {
        for entry in entries.flatten() {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "failed to remove socket");
            }
        }
    }
    info!("supervisor cleanup complete");
}

/// Take the exclusive instance lock and record our PID in it.
fn acquire_lock(config: &Config) -> Result<File, LifecycleError> {
    let mut lock_file = File::options()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)
        .map_err(LifecycleError::Io)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the supervisor.

use foreman_core::{FleetDescriptor, WorkerKind};
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Supervisor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: FOREMAN_STATE_DIR > XDG_STATE_HOME/foreman > ~/.local/state/foreman
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FOREMAN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("foreman"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/foreman"))
}

/// Path of the worker binary the spawn engine launches.
///
/// `FOREMAN_WORKER_BIN` overrides; default is `foreman-worker` next to the
/// running executable, falling back to `$PATH` lookup.
pub fn worker_bin() -> PathBuf {
    if let Ok(bin) = std::env::var("FOREMAN_WORKER_BIN") {
        return PathBuf::from(bin);
    }
    if let Ok(current) = std::env::current_exe() {
        let sibling = current.with_file_name("foreman-worker");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("foreman-worker")
}

/// How long the spawn engine waits for a child to open its channel.
pub fn channel_accept_timeout() -> Duration {
    std::env::var("FOREMAN_CHANNEL_ACCEPT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

/// The declared fleet, with environment overrides applied on top of the
/// standard per-kind defaults.
pub fn fleet() -> FleetDescriptor {
    let mut fleet = FleetDescriptor::standard();
    for descriptor in &mut fleet.workers {
        if let Some(count) = count_override(descriptor.kind) {
            descriptor.count = count.max(1);
        }
        for (env_var, key) in config_overrides(descriptor.kind) {
            if let Ok(value) = std::env::var(env_var) {
                descriptor.config.insert(key.to_string(), value);
            }
        }
    }
    fleet
}

fn count_override(kind: WorkerKind) -> Option<u32> {
    let var = match kind {
        WorkerKind::Database => "FOREMAN_DATABASE_WORKERS",
        WorkerKind::Http => "FOREMAN_HTTP_WORKERS",
        WorkerKind::Queue => "FOREMAN_QUEUE_WORKERS",
        WorkerKind::GraphQl => "FOREMAN_GRAPHQL_WORKERS",
    };
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

fn config_overrides(kind: WorkerKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        WorkerKind::Database => &[
            ("FOREMAN_DB_URL", "db_url"),
            ("FOREMAN_DB_NAME", "db_name"),
            ("FOREMAN_COLLECTION_NAME", "collection_name"),
        ],
        WorkerKind::Http => {
            &[("FOREMAN_HTTP_PORT", "port"), ("FOREMAN_JWT_SECRET", "jwt_secret")]
        }
        WorkerKind::Queue => &[
            ("FOREMAN_CONSUME_QUEUE", "consumeQueue"),
            ("FOREMAN_CONSUME_COMPENSATION_QUEUE", "consumeCompensationQueue"),
            ("FOREMAN_PRODUCE_QUEUE", "produceQueue"),
            ("FOREMAN_RABBITMQ_URL", "rabbitMqUrl"),
        ],
        WorkerKind::GraphQl => {
            &[("FOREMAN_GRAPHQL_PORT", "graphql_port"), ("FOREMAN_JWT_SECRET", "jwt_secret")]
        }
    }
}

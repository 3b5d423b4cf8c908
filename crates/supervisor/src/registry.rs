// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of live children, each labeled with its worker kind and PID.
//!
//! Records are created by the spawn engine, mutated only by the exit handler
//! and kill path, and removed after exit. Insertion order is preserved so
//! candidate selection stays deterministic.

use foreman_core::{Envelope, WorkerId, WorkerKind};
use tokio::sync::mpsc;

/// One spawned child process.
#[derive(Debug)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub kind: WorkerKind,
    pub pid: u32,
    pub spawned_at_ms: u64,
    /// Outbound channel drained by this child's writer pump.
    pub outbound: mpsc::Sender<Envelope>,
    /// Exit code once the process has exited.
    pub exit_code: Option<i32>,
    /// True once the supervisor has signalled this child.
    pub killed: bool,
    /// Last heartbeat, epoch ms.
    pub last_beat_ms: Option<u64>,
    /// Instance ID the worker reported in its health beats.
    pub instance_id: Option<String>,
}

impl WorkerRecord {
    /// Liveness short of the OS scheduler check: not exited, not killed.
    pub fn is_live(&self) -> bool {
        self.exit_code.is_none() && !self.killed
    }

    /// Timestamp the watchdog measures staleness against.
    pub fn last_activity_ms(&self) -> u64 {
        self.last_beat_ms.unwrap_or(self.spawned_at_ms)
    }
}

/// Live worker records in insertion order.
#[derive(Debug, Default)]
pub struct Registry {
    workers: Vec<WorkerRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: WorkerRecord) {
        self.workers.push(record);
    }

    pub fn remove(&mut self, worker: &WorkerId) -> Option<WorkerRecord> {
        let idx = self.workers.iter().position(|w| &w.worker_id == worker)?;
        Some(self.workers.remove(idx))
    }

    pub fn get(&self, worker: &WorkerId) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| &w.worker_id == worker)
    }

    pub fn get_mut(&mut self, worker: &WorkerId) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| &w.worker_id == worker)
    }

    pub fn kind_of(&self, worker: &WorkerId) -> Option<WorkerKind> {
        self.get(worker).map(|w| w.kind)
    }

    /// All records of a kind, in insertion order.
    pub fn of_kind(&self, kind: WorkerKind) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter().filter(move |w| w.kind == kind)
    }

    /// First record of a kind that passes the basic liveness check.
    pub fn first_live(&self, kind: WorkerKind) -> Option<&WorkerRecord> {
        self.of_kind(kind).find(|w| w.is_live())
    }

    pub fn live_count(&self, kind: WorkerKind) -> usize {
        self.of_kind(kind).filter(|w| w.is_live()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

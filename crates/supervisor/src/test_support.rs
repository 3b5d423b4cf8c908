// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters and builders for supervisor tests.
//!
//! `FakeSpawner` registers in-memory workers instead of processes: envelopes
//! "sent" to a worker land in a per-worker queue tests can drain, and `kill`
//! reports a synthetic exit on the event queue exactly like the real exit
//! watcher would.

#![allow(clippy::unwrap_used)]

use crate::probe::{SchedProbe, SchedState};
use crate::spawn::{SpawnError, SpawnedWorker, Spawner};
use crate::supervisor::{Supervisor, SupervisorEvent};
use async_trait::async_trait;
use foreman_core::{Clock, Envelope, MessageId, Status, WorkerId, WorkerKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct FakeWorkerEntry {
    worker_id: WorkerId,
    kind: WorkerKind,
    pid: u32,
    config: BTreeMap<String, String>,
    inbox: Option<mpsc::Receiver<Envelope>>,
    events: mpsc::Sender<SupervisorEvent>,
    killed: bool,
}

#[derive(Default)]
struct FakeSpawnerState {
    next_pid: u32,
    attempts: u32,
    fail_next: u32,
    workers: Vec<FakeWorkerEntry>,
}

/// In-memory spawner for deterministic engine tests.
#[derive(Clone, Default)]
pub struct FakeSpawner {
    state: Arc<Mutex<FakeSpawnerState>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` spawn attempts fail.
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Total spawn attempts, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    /// Worker IDs spawned for a kind, in spawn order.
    pub fn workers_of(&self, kind: WorkerKind) -> Vec<WorkerId> {
        self.lock()
            .workers
            .iter()
            .filter(|w| w.kind == kind)
            .map(|w| w.worker_id.clone())
            .collect()
    }

    /// The most recently spawned worker.
    pub fn last_worker(&self) -> Option<WorkerId> {
        self.lock().workers.last().map(|w| w.worker_id.clone())
    }

    pub fn pid_of(&self, worker: &WorkerId) -> Option<u32> {
        self.lock().workers.iter().find(|w| &w.worker_id == worker).map(|w| w.pid)
    }

    pub fn config_of(&self, worker: &WorkerId) -> Option<BTreeMap<String, String>> {
        self.lock().workers.iter().find(|w| &w.worker_id == worker).map(|w| w.config.clone())
    }

    pub fn was_killed(&self, worker: &WorkerId) -> bool {
        self.lock().workers.iter().any(|w| &w.worker_id == worker && w.killed)
    }

    /// Drain everything delivered to a worker's channel so far.
    pub fn drain_sent(&self, worker: &WorkerId) -> Vec<Envelope> {
        let mut state = self.lock();
        let Some(entry) = state.workers.iter_mut().find(|w| &w.worker_id == worker) else {
            return Vec::new();
        };
        let Some(inbox) = entry.inbox.as_mut() else {
            return Vec::new();
        };
        let mut sent = Vec::new();
        while let Ok(envelope) = inbox.try_recv() {
            sent.push(envelope);
        }
        sent
    }

    /// Drop a worker's channel receiver so further sends fail.
    pub fn close_channel(&self, worker: &WorkerId) {
        let mut state = self.lock();
        if let Some(entry) = state.workers.iter_mut().find(|w| &w.worker_id == worker) {
            entry.inbox = None;
        }
    }

    /// Report an unexpected exit, as the real exit watcher would.
    pub async fn simulate_exit(&self, worker: &WorkerId, exit_code: Option<i32>) {
        let events = {
            let state = self.lock();
            state.workers.iter().find(|w| &w.worker_id == worker).map(|w| w.events.clone())
        };
        if let Some(events) = events {
            let _ = events
                .send(SupervisorEvent::WorkerExited { worker: worker.clone(), exit_code })
                .await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeSpawnerState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn spawn(
        &self,
        kind: WorkerKind,
        config: &BTreeMap<String, String>,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Result<SpawnedWorker, SpawnError> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(SpawnError::Io(std::io::Error::other("injected spawn failure")));
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        let worker_id = WorkerId::generate();
        let (outbound, inbox) = mpsc::channel(64);
        state.workers.push(FakeWorkerEntry {
            worker_id: worker_id.clone(),
            kind,
            pid,
            config: config.clone(),
            inbox: Some(inbox),
            events,
            killed: false,
        });
        Ok(SpawnedWorker { worker_id, pid, outbound })
    }

    async fn kill(&self, worker: &WorkerId, _pid: u32) {
        let events = {
            let mut state = self.lock();
            let Some(entry) = state.workers.iter_mut().find(|w| &w.worker_id == worker) else {
                return;
            };
            entry.killed = true;
            entry.events.clone()
        };
        let _ = events
            .send(SupervisorEvent::WorkerExited { worker: worker.clone(), exit_code: None })
            .await;
    }
}

/// Scripted scheduler-state probe. Unset PIDs read as `Idle`.
#[derive(Clone, Default)]
pub struct FakeSchedProbe {
    states: Arc<Mutex<HashMap<u32, SchedState>>>,
}

impl FakeSchedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pid: u32, state: SchedState) {
        self.states.lock().unwrap().insert(pid, state);
    }
}

#[async_trait]
impl SchedProbe for FakeSchedProbe {
    async fn state(&self, pid: u32) -> SchedState {
        let states = self.states.lock().unwrap();
        states.get(&pid).copied().unwrap_or(SchedState::Idle)
    }
}

/// A routed `completed` envelope with one destination.
pub fn routed_envelope(message_id: &str, destination: &str) -> Envelope {
    Envelope::new(
        MessageId::new(message_id),
        Status::Completed,
        vec![destination.to_string()],
        serde_json::Value::Null,
    )
    .unwrap()
}

/// Apply every event currently queued, including ones produced while
/// handling (kill → exit → replacement chains).
pub async fn drain_events<S, P, C>(
    supervisor: &mut Supervisor<S, P, C>,
    events: &mut mpsc::Receiver<SupervisorEvent>,
) where
    S: Spawner,
    P: SchedProbe,
    C: Clock,
{
    while let Ok(event) = events.try_recv() {
        supervisor.handle_event(event).await;
    }
}

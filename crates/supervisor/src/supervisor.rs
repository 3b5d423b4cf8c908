// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor engine: a single actor over the shared event queue.
//!
//! All registry and pending-table mutations happen inside `handle_event`,
//! one event at a time. Timers (watchdog, routing back-off) are spawned
//! sleeps that feed events back into the same queue.

use crate::journal::PendingJournal;
use crate::pending::PendingTable;
use crate::probe::SchedProbe;
use crate::registry::{Registry, WorkerRecord};
use crate::spawn::{SpawnError, Spawner};
use foreman_core::{Clock, Envelope, FleetDescriptor, MessageId, Status, WorkerId, WorkerKind};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Interval at which workers are required to emit health beats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// How often the watchdog sweeps the registry.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

/// A worker whose last beat (or spawn) is older than this is restarted.
/// Three missed beats.
pub const WATCHDOG_THRESHOLD: Duration = Duration::from_secs(30);

/// Back-off before re-entering routing when every candidate is busy.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Back-off before the single spawn retry.
pub const SPAWN_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Depth of the shared event queue.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Everything the supervisor loop reacts to.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A frame arrived from a child.
    Inbound { from: WorkerId, envelope: Envelope },
    /// A child process exited (or was killed).
    WorkerExited { worker: WorkerId, exit_code: Option<i32> },
    /// A delayed routing retry fired.
    RetryRoute { from: WorkerId, kind: WorkerKind, envelope: Envelope },
    /// Periodic heartbeat sweep.
    WatchdogTick,
}

/// The coordination core. Owns the registry and the pending table.
pub struct Supervisor<S, P, C> {
    pub(crate) spawner: S,
    pub(crate) probe: P,
    pub(crate) clock: C,
    pub(crate) fleet: FleetDescriptor,
    pub(crate) registry: Registry,
    pub(crate) pending: PendingTable,
    pub(crate) journal: Option<PendingJournal>,
    pub(crate) events_tx: mpsc::Sender<SupervisorEvent>,
    pub(crate) retry_delay: Duration,
    shutting_down: bool,
}

impl<S, P, C> Supervisor<S, P, C>
where
    S: Spawner,
    P: SchedProbe,
    C: Clock,
{
    /// Create a supervisor and the receiving end of its event queue.
    ///
    /// `pending` normally comes from journal replay at startup.
    pub fn new(
        spawner: S,
        probe: P,
        clock: C,
        fleet: FleetDescriptor,
        pending: PendingTable,
        journal: Option<PendingJournal>,
    ) -> (Self, mpsc::Receiver<SupervisorEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        (
            Self {
                spawner,
                probe,
                clock,
                fleet,
                registry: Registry::new(),
                pending,
                journal,
                events_tx,
                retry_delay: RETRY_DELAY,
                shutting_down: false,
            },
            events_rx,
        )
    }

    /// A sender for feeding the shared event queue.
    pub fn events_tx(&self) -> mpsc::Sender<SupervisorEvent> {
        self.events_tx.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Spawn the declared fleet: `count` instances of every descriptor.
    ///
    /// Failure to get even one instance of a declared kind up is fatal.
    pub async fn boot(&mut self) -> Result<(), SpawnError> {
        for descriptor in self.fleet.workers.clone() {
            let spawned =
                self.create_worker(descriptor.kind, descriptor.count, descriptor.config).await?;
            if spawned == 0 {
                return Err(SpawnError::InvalidArgument(format!(
                    "could not spawn any {} after retries",
                    descriptor.kind
                )));
            }
            // Workers drained here pick up anything replayed from the journal
            self.drain_pending(descriptor.kind).await;
        }
        Ok(())
    }

    /// Start the periodic watchdog ticker feeding the event queue.
    pub fn start_watchdog(&self) {
        let tick_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                if tick_tx.send(SupervisorEvent::WatchdogTick).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Apply one event. The only entry point that mutates state.
    pub async fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Inbound { from, envelope } => {
                self.on_worker_message(&from, envelope).await;
            }
            SupervisorEvent::WorkerExited { worker, exit_code } => {
                self.on_worker_exited(&worker, exit_code).await;
            }
            SupervisorEvent::RetryRoute { from, kind, envelope } => {
                info!(
                    kind = %kind,
                    message_id = %envelope.message_id,
                    "re-entering routing after back-off"
                );
                self.forward_to_peer(&from, envelope, kind).await;
            }
            SupervisorEvent::WatchdogTick => {
                self.watchdog_sweep().await;
            }
        }
    }

    /// Launch `count` workers of `kind`, retrying each slot once.
    ///
    /// Returns how many came up. A slot that fails both attempts surfaces an
    /// error envelope in the log and is given up on.
    pub async fn create_worker(
        &mut self,
        kind: WorkerKind,
        count: u32,
        config: BTreeMap<String, String>,
    ) -> Result<u32, SpawnError> {
        if count < 1 {
            return Err(SpawnError::InvalidArgument(format!(
                "worker count must be at least 1, got {count}"
            )));
        }

        let mut spawned = 0;
        for _ in 0..count {
            match self.spawn_one(kind, &config).await {
                Ok(worker) => {
                    self.register(kind, worker);
                    spawned += 1;
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "spawn failed; retrying once");
                    tokio::time::sleep(SPAWN_RETRY_BACKOFF).await;
                    match self.spawn_one(kind, &config).await {
                        Ok(worker) => {
                            self.register(kind, worker);
                            spawned += 1;
                        }
                        Err(e) => {
                            let observer = Envelope::error(
                                MessageId::generate(),
                                format!("failed to spawn {kind}: {e}"),
                            );
                            error!(
                                kind = %kind,
                                envelope = %serde_json::to_string(&observer).unwrap_or_default(),
                                "spawn failed after retry; slot abandoned"
                            );
                        }
                    }
                }
            }
        }
        Ok(spawned)
    }

    async fn spawn_one(
        &self,
        kind: WorkerKind,
        config: &BTreeMap<String, String>,
    ) -> Result<crate::spawn::SpawnedWorker, SpawnError> {
        self.spawner.spawn(kind, config, self.events_tx.clone()).await
    }

    fn register(&mut self, kind: WorkerKind, worker: crate::spawn::SpawnedWorker) {
        self.registry.insert(WorkerRecord {
            worker_id: worker.worker_id,
            kind,
            pid: worker.pid,
            spawned_at_ms: self.clock.epoch_ms(),
            outbound: worker.outbound,
            exit_code: None,
            killed: false,
            last_beat_ms: None,
            instance_id: None,
        });
    }

    /// Kill a child; the exit watcher drives replacement and drain.
    pub(crate) async fn restart_worker(&mut self, worker: &WorkerId) {
        let Some(record) = self.registry.get_mut(worker) else {
            return;
        };
        record.killed = true;
        let pid = record.pid;
        let kind = record.kind;
        warn!(worker = %worker, kind = %kind, pid, "restarting worker");
        self.spawner.kill(worker, pid).await;
    }

    /// Exit handler: remove, log, replace, drain.
    async fn on_worker_exited(&mut self, worker: &WorkerId, exit_code: Option<i32>) {
        let Some(record) = self.registry.remove(worker) else {
            // Already gone (shutdown or duplicate exit report)
            return;
        };
        warn!(
            worker = %worker,
            kind = %record.kind,
            pid = record.pid,
            exit_code = ?exit_code,
            killed = record.killed,
            "worker exited"
        );

        if self.shutting_down {
            return;
        }

        let config = self.fleet.config_for(record.kind);
        match self.create_worker(record.kind, 1, config).await {
            Ok(n) if n > 0 => self.drain_pending(record.kind).await,
            Ok(_) => warn!(kind = %record.kind, "replacement did not come up; pending retained"),
            Err(e) => error!(kind = %record.kind, error = %e, "replacement spawn failed"),
        }
    }

    /// Replay the kind's pending list to its first alive worker.
    ///
    /// Entries are not removed here; removal is driven by completion acks.
    pub(crate) async fn drain_pending(&mut self, kind: WorkerKind) {
        let Some(record) = self.registry.first_live(kind) else {
            if self.pending.len(kind) > 0 {
                warn!(kind = %kind, "no alive worker to drain pending messages to");
            }
            return;
        };
        let worker_id = record.worker_id.clone();
        let outbound = record.outbound.clone();

        for envelope in self.pending.drain(kind) {
            let message_id = envelope.message_id.clone();
            match outbound.try_send(envelope) {
                Ok(()) => info!(
                    worker = %worker_id,
                    kind = %kind,
                    message_id = %message_id,
                    "pending message replayed"
                ),
                Err(e) => error!(
                    worker = %worker_id,
                    kind = %kind,
                    message_id = %message_id,
                    error = %e,
                    "pending replay send failed"
                ),
            }
        }
    }

    /// Restart every live worker whose heartbeat has gone stale.
    async fn watchdog_sweep(&mut self) {
        let now = self.clock.epoch_ms();
        let threshold = WATCHDOG_THRESHOLD.as_millis() as u64;
        let stale: Vec<WorkerId> = self
            .registry
            .iter()
            .filter(|r| r.is_live() && now.saturating_sub(r.last_activity_ms()) > threshold)
            .map(|r| r.worker_id.clone())
            .collect();

        for worker in stale {
            warn!(worker = %worker, "heartbeat stale beyond threshold; restarting");
            self.restart_worker(&worker).await;
        }
    }

    /// Schedule a routing retry after the back-off delay.
    ///
    /// The envelope re-enters the flow as `completed` so it forwards as a
    /// plain message rather than re-triggering the busy path.
    pub(crate) fn schedule_retry(&self, from: WorkerId, kind: WorkerKind, mut envelope: Envelope) {
        envelope.status = Status::Completed;
        let tx = self.events_tx.clone();
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SupervisorEvent::RetryRoute { from, kind, envelope }).await;
        });
    }

    /// Remove a pending entry and journal the removal.
    pub(crate) fn remove_pending(&mut self, kind: WorkerKind, message_id: &MessageId) {
        if !self.pending.remove(kind, message_id) {
            return;
        }
        info!(kind = %kind, message_id = %message_id, "pending entry acknowledged");
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record_remove(kind, message_id) {
                warn!(error = %e, "journal remove append failed");
            }
        }
    }

    /// Track a pending entry and journal it. Returns false on duplicate.
    pub(crate) fn track_pending(&mut self, kind: WorkerKind, envelope: &Envelope) -> bool {
        if !self.pending.track(kind, envelope.clone(), self.clock.epoch_ms()) {
            return false;
        }
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record_track(kind, envelope) {
                warn!(error = %e, "journal track append failed");
            }
        }
        true
    }

    /// Terminate the fleet and flush durable state.
    pub async fn shutdown(&mut self) {
        self.shutting_down = true;
        let live: Vec<(WorkerId, u32)> = self
            .registry
            .iter()
            .filter(|r| r.is_live())
            .map(|r| (r.worker_id.clone(), r.pid))
            .collect();
        for (worker, pid) in live {
            if let Some(record) = self.registry.get_mut(&worker) {
                record.killed = true;
            }
            self.spawner.kill(&worker, pid).await;
        }
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.flush() {
                warn!(error = %e, "journal flush on shutdown failed");
            }
        }
        info!("supervisor shutdown complete");
    }

    /// Shrink the routing back-off (deterministic tests).
    #[cfg(any(test, feature = "test-support"))]
    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.retry_delay = delay;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing of inbound envelopes: fan-out per destination, heartbeat and ack
//! handling, peer selection, back-pressure.
//!
//! Every destination entry is an independent routing decision. No ordering
//! is promised across destinations or worker kinds; per-channel order is
//! inherited from the wire.

use crate::probe::SchedProbe;
use crate::spawn::Spawner;
use crate::supervisor::Supervisor;
use foreman_core::{
    Clock, Destination, Envelope, Status, Target, WorkerId, WorkerKind, SERVER_BUSY, SUPERVISOR,
};
use tracing::{error, info, warn};

impl<S, P, C> Supervisor<S, P, C>
where
    S: Spawner,
    P: SchedProbe,
    C: Clock,
{
    /// Entry point for every frame a child sends.
    pub(crate) async fn on_worker_message(&mut self, from: &WorkerId, envelope: Envelope) {
        info!(
            from = %from,
            message_id = %envelope.message_id,
            status = ?envelope.status,
            destinations = ?envelope.destination,
            "routing envelope"
        );

        // Any completed envelope acknowledges the sender's pending entry,
        // whether or not the reply lists `supervisor` explicitly.
        if envelope.status == Status::Completed {
            if let Some(kind) = self.registry.kind_of(from) {
                self.remove_pending(kind, &envelope.message_id);
            }
        }

        for raw in envelope.destination.clone() {
            match Destination::parse(&raw) {
                Err(e) => {
                    error!(
                        from = %from,
                        destination = %raw,
                        message_id = %envelope.message_id,
                        error = %e,
                        "undeliverable destination dropped"
                    );
                }
                Ok(dest) => match dest.target() {
                    Target::Supervisor => self.on_supervisor_destination(from, &envelope),
                    Target::Peer(kind) => {
                        let copy = envelope.with_destination(raw);
                        self.forward_to_peer(from, copy, kind).await;
                    }
                },
            }
        }
    }

    /// Terminal signals addressed to the coordination core.
    fn on_supervisor_destination(&mut self, from: &WorkerId, envelope: &Envelope) {
        match envelope.status {
            Status::Healthy => {
                let now = self.clock.epoch_ms();
                let Some(record) = self.registry.get_mut(from) else {
                    warn!(from = %from, "heartbeat from unregistered worker");
                    return;
                };
                record.last_beat_ms = Some(now);
                if let Some(instance) = envelope.data.get("instanceId").and_then(|v| v.as_str()) {
                    record.instance_id = Some(instance.to_string());
                }
            }
            Status::Completed => {
                // Ack: clear the entry for every peer destination the reply
                // also fans out to.
                let message_id = envelope.message_id.clone();
                for raw in &envelope.destination {
                    if raw == SUPERVISOR {
                        continue;
                    }
                    if let Ok(dest) = Destination::parse(raw) {
                        if let Some(kind) = dest.kind() {
                            self.remove_pending(kind, &message_id);
                        }
                    }
                }
            }
            Status::Failed | Status::Error => {
                warn!(
                    from = %from,
                    message_id = %envelope.message_id,
                    status = ?envelope.status,
                    reason = ?envelope.reason,
                    "terminal envelope for supervisor dropped"
                );
            }
        }
    }

    /// Select an eligible peer of `kind` and forward, spawning or backing
    /// off when none qualifies.
    pub(crate) async fn forward_to_peer(
        &mut self,
        from: &WorkerId,
        envelope: Envelope,
        kind: WorkerKind,
    ) {
        // Record intent before sending so a crash cannot lose the message.
        self.track_pending(kind, &envelope);

        // A worker reporting a non-recoverable error gets restarted; the
        // error envelope itself is never forwarded.
        if envelope.status == Status::Error {
            error!(
                from = %from,
                message_id = %envelope.message_id,
                reason = ?envelope.reason,
                "error envelope from worker; restarting it"
            );
            if self.registry.get(from).is_some() {
                self.restart_worker(from).await;
            }
            return;
        }

        // Candidates: alive and not currently on-CPU.
        let live: Vec<(WorkerId, u32)> = self
            .registry
            .of_kind(kind)
            .filter(|r| r.is_live())
            .map(|r| (r.worker_id.clone(), r.pid))
            .collect();
        let mut candidates = Vec::with_capacity(live.len());
        for (worker_id, pid) in live {
            if self.probe.state(pid).await.eligible() {
                candidates.push(worker_id);
            }
        }

        // Nobody home: add capacity; the drain after spawn delivers.
        if candidates.is_empty() {
            warn!(kind = %kind, message_id = %envelope.message_id, "no eligible worker; spawning");
            let config = self.fleet.config_for(kind);
            match self.create_worker(kind, 1, config).await {
                Ok(n) if n > 0 => self.drain_pending(kind).await,
                Ok(_) => {}
                Err(e) => error!(kind = %kind, error = %e, "capacity spawn failed"),
            }
            return;
        }

        // A saturated sender told us so; do not hand its work straight back.
        let mut envelope = envelope;
        if envelope.status == Status::Failed && envelope.reason.as_deref() == Some(SERVER_BUSY) {
            candidates.retain(|id| id != from);
            // The bounce frame carries only the ID; re-home the tracked
            // original so the sibling gets the actual work.
            if let Some(original) = self.pending.get(kind, &envelope.message_id) {
                envelope = original.clone();
            }
        }

        // Everyone eligible is the saturated sender: back off and re-enter.
        if candidates.is_empty() {
            info!(
                kind = %kind,
                message_id = %envelope.message_id,
                delay = ?self.retry_delay,
                "all candidates busy; scheduling retry"
            );
            self.schedule_retry(from.clone(), kind, envelope);
            return;
        }

        // Deterministic: first candidate in insertion order.
        let target = candidates.remove(0);
        let Some(record) = self.registry.get(&target) else {
            error!(worker = %target, "candidate vanished before send");
            return;
        };
        // Recheck: the probe is advisory and the registry may have moved on.
        if !record.is_live() {
            error!(worker = %target, message_id = %envelope.message_id, "send to dead worker");
            return;
        }
        let message_id = envelope.message_id.clone();
        match record.outbound.try_send(envelope) {
            Ok(()) => info!(
                worker = %target,
                kind = %kind,
                message_id = %message_id,
                "envelope forwarded"
            ),
            Err(e) => error!(
                worker = %target,
                kind = %kind,
                message_id = %message_id,
                error = %e,
                "send to dead worker channel"
            ),
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

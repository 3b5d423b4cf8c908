// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker-kind ordered list of messages currently in flight.
//!
//! Entries are recorded before a send (so a crash cannot lose the message)
//! and removed only by a completion ack. They survive worker restarts for
//! their kind and are replayed to replacements by the drain path.

use foreman_core::{Envelope, MessageId, WorkerKind};
use std::collections::BTreeMap;

/// One in-flight message.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub message_id: MessageId,
    pub envelope: Envelope,
    pub enqueued_at_ms: u64,
}

/// The sole durable state of the coordinator during a run.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: BTreeMap<WorkerKind, Vec<PendingEntry>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append iff no entry with the same message ID exists for this kind.
    ///
    /// Returns true when the entry was added.
    pub fn track(&mut self, kind: WorkerKind, envelope: Envelope, now_ms: u64) -> bool {
        let list = self.entries.entry(kind).or_default();
        if list.iter().any(|e| e.message_id == envelope.message_id) {
            return false;
        }
        list.push(PendingEntry {
            message_id: envelope.message_id.clone(),
            envelope,
            enqueued_at_ms: now_ms,
        });
        true
    }

    /// Delete any entry matching the ID. Returns true when one was removed.
    pub fn remove(&mut self, kind: WorkerKind, message_id: &MessageId) -> bool {
        let Some(list) = self.entries.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| &e.message_id != message_id);
        list.len() < before
    }

    /// Snapshot of the kind's in-flight envelopes, in insertion order.
    ///
    /// Does not mutate; removal is driven by completion acks.
    pub fn drain(&self, kind: WorkerKind) -> Vec<Envelope> {
        self.entries
            .get(&kind)
            .map(|list| list.iter().map(|e| e.envelope.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: WorkerKind) -> usize {
        self.entries.get(&kind).map_or(0, |l| l.len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|l| l.is_empty())
    }

    /// The tracked envelope for an ID, if any.
    pub fn get(&self, kind: WorkerKind, message_id: &MessageId) -> Option<&Envelope> {
        self.entries
            .get(&kind)?
            .iter()
            .find(|e| &e.message_id == message_id)
            .map(|e| &e.envelope)
    }

    pub fn contains(&self, kind: WorkerKind, message_id: &MessageId) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|l| l.iter().any(|e| &e.message_id == message_id))
    }

    /// Every live entry across all kinds (journal compaction).
    pub fn iter_all(&self) -> impl Iterator<Item = (WorkerKind, &PendingEntry)> {
        self.entries.iter().flat_map(|(kind, list)| list.iter().map(move |e| (*kind, e)))
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;

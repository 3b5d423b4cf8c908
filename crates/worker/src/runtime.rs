// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker runtime: channel client, heartbeat, dispatch.
//!
//! Single-flight by contract: while a handler runs, further inbound work is
//! declined with `SERVER_BUSY` and the router re-homes it. The read loop
//! itself never blocks on a handler, so heartbeats and busy replies keep
//! flowing.

use crate::handlers::HandlerTable;
use foreman_core::{
    Clock, Destination, Envelope, MessageId, Status, SystemClock, Target, WorkerKind, SUPERVISOR,
};
use foreman_wire::{Channel, ProtocolError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Interval between health beats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Depth of the outbound reply queue.
const OUTBOUND_DEPTH: usize = 64;

/// Errors that end a worker run
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("channel error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("outbound queue closed")]
    OutboundClosed,
}

/// A worker process's view of the fabric.
pub struct WorkerRuntime {
    kind: WorkerKind,
    instance_id: String,
    handlers: Arc<Mutex<HandlerTable>>,
    heartbeat_interval: Duration,
}

impl WorkerRuntime {
    /// Create a runtime for `kind`, generating and logging the instance ID.
    pub fn new(kind: WorkerKind, handlers: HandlerTable) -> Self {
        let instance_id = format!("{}-{}", kind.as_wire(), uuid::Uuid::new_v4());
        info!(instance_id = %instance_id, "worker starting");
        Self {
            kind,
            instance_id,
            handlers: Arc::new(Mutex::new(handlers)),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Shrink the heartbeat interval (tests).
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Drive the contract over the given channel stream until it closes.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<(), WorkerError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (mut channel_reader, mut channel_writer) = Channel::new(reader, writer).split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Envelope>(OUTBOUND_DEPTH);

        // Writer pump: everything the worker emits funnels through here
        let writer_task = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                if let Err(e) = channel_writer.send(&envelope).await {
                    error!(error = %e, "channel write failed");
                    return Err(e);
                }
            }
            Ok(())
        });

        // Heartbeat task
        let beat_outbound = outbound.clone();
        let beat_instance = self.instance_id.clone();
        let beat_interval = self.heartbeat_interval;
        let heartbeat_task = tokio::spawn(async move {
            let clock = SystemClock;
            let mut interval = tokio::time::interval(beat_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let beat = Envelope::healthy(&beat_instance, clock.epoch_ms());
                if beat_outbound.send(beat).await.is_err() {
                    break;
                }
            }
        });

        let busy = Arc::new(AtomicBool::new(false));
        let result = loop {
            match channel_reader.recv().await {
                Ok(envelope) => self.on_envelope(envelope, &outbound, &busy).await?,
                Err(ProtocolError::ChannelClosed) => {
                    info!("supervisor channel closed; exiting");
                    break Ok(());
                }
                Err(e) => {
                    error!(error = %e, "channel read failed");
                    let notice =
                        Envelope::error(MessageId::generate(), format!("channel read failed: {e}"));
                    let _ = outbound.send(notice).await;
                    break Err(WorkerError::Protocol(e));
                }
            }
        };

        heartbeat_task.abort();
        drop(outbound);
        // Let the writer flush what is queued before tearing down
        let _ = writer_task.await;
        result
    }

    /// Filter an inbound envelope down to our own destinations and act.
    async fn on_envelope(
        &self,
        envelope: Envelope,
        outbound: &mpsc::Sender<Envelope>,
        busy: &Arc<AtomicBool>,
    ) -> Result<(), WorkerError> {
        let mine: Vec<Destination> = envelope
            .destination
            .iter()
            .filter_map(|raw| Destination::parse(raw).ok())
            .filter(|dest| dest.target() == Target::Peer(self.kind))
            .collect();
        if mine.is_empty() {
            return Ok(());
        }

        // Single-flight: decline while a handler is running. The original
        // message ID rides along so the router can re-home the exact work.
        if busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            for dest in &mine {
                warn!(
                    message_id = %envelope.message_id,
                    destination = %dest.raw(),
                    "busy; declining message"
                );
                let declined =
                    Envelope::server_busy(envelope.message_id.clone(), dest.raw().to_string());
                outbound.send(declined).await.map_err(|_| WorkerError::OutboundClosed)?;
            }
            return Ok(());
        }

        let handlers = Arc::clone(&self.handlers);
        let outbound = outbound.clone();
        let busy = Arc::clone(busy);
        tokio::spawn(async move {
            for dest in &mine {
                let reply = {
                    let mut table = handlers.lock();
                    table.dispatch(dest.method(), dest.arg(), &envelope)
                };
                let mut destination = reply.destination;
                // Completion replies always carry the supervisor ack
                if reply.status == Status::Completed
                    && !destination.iter().any(|d| d == SUPERVISOR)
                {
                    destination.push(SUPERVISOR.to_string());
                }
                let out = Envelope {
                    message_id: envelope.message_id.clone(),
                    status: reply.status,
                    reason: reply.reason,
                    destination,
                    data: reply.data,
                };
                if outbound.send(out).await.is_err() {
                    break;
                }
            }
            busy.store(false, Ordering::Release);
        });

        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;

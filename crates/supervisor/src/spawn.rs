// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process spawning: child creation, channel attachment, pumps.
//!
//! Each child inherits the three standard streams and gets a fourth duplex
//! channel: a per-worker Unix socket the supervisor binds before the spawn
//! and the child connects back to. Two pump tasks per child move frames
//! between the socket and the supervisor's queues; a third task waits for
//! the process and reports its exit.

use crate::supervisor::SupervisorEvent;
use async_trait::async_trait;
use foreman_core::{Envelope, WorkerId, WorkerKind};
use foreman_wire::{ChannelReader, ChannelWriter, ProtocolError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Depth of each child's outbound channel.
const OUTBOUND_DEPTH: usize = 64;

/// Environment variable naming the child's kind.
pub const ENV_WORKER_KIND: &str = "FOREMAN_WORKER_KIND";

/// Environment variable carrying the channel socket path.
pub const ENV_CHANNEL: &str = "FOREMAN_CHANNEL";

/// Errors from spawn operations
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("spawn failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker never opened its channel at {0}")]
    ChannelTimeout(String),

    #[error("channel error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// What the spawn engine hands back for registration.
#[derive(Debug)]
pub struct SpawnedWorker {
    pub worker_id: WorkerId,
    pub pid: u32,
    /// Sender drained by this child's writer pump.
    pub outbound: mpsc::Sender<Envelope>,
}

/// Process-launching seam between the supervisor and the OS.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    /// Launch one child of `kind` with `config` in its environment.
    ///
    /// Inbound frames and the eventual exit are reported on `events`.
    async fn spawn(
        &self,
        kind: WorkerKind,
        config: &BTreeMap<String, String>,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Result<SpawnedWorker, SpawnError>;

    /// Ask a child to terminate. The exit watcher reports the actual exit.
    async fn kill(&self, worker: &WorkerId, pid: u32);
}

/// Real spawner executing the worker binary.
pub struct ProcessSpawner {
    worker_bin: PathBuf,
    sockets_dir: PathBuf,
    accept_timeout: Duration,
}

impl ProcessSpawner {
    pub fn new(worker_bin: PathBuf, sockets_dir: PathBuf, accept_timeout: Duration) -> Self {
        Self { worker_bin, sockets_dir, accept_timeout }
    }
}

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn spawn(
        &self,
        kind: WorkerKind,
        config: &BTreeMap<String, String>,
        events: mpsc::Sender<SupervisorEvent>,
    ) -> Result<SpawnedWorker, SpawnError> {
        let worker_id = WorkerId::generate();

        std::fs::create_dir_all(&self.sockets_dir)?;
        let socket_path = self.sockets_dir.join(format!("{worker_id}.sock"));
        // Remove stale socket from a previous run
        let _ = std::fs::remove_file(&socket_path);
        let listener = UnixListener::bind(&socket_path)?;

        let mut cmd = tokio::process::Command::new(&self.worker_bin);
        cmd.env(ENV_WORKER_KIND, kind.as_wire())
            .env(ENV_CHANNEL, &socket_path)
            .envs(config)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn()?;
        let pid = child.id().unwrap_or(0);

        // Wait for the child to connect its end of the channel
        let stream = match tokio::time::timeout(self.accept_timeout, listener.accept()).await {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e.into());
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(SpawnError::ChannelTimeout(socket_path.display().to_string()));
            }
        };
        drop(listener);
        let _ = std::fs::remove_file(&socket_path);

        let (read_half, write_half) = stream.into_split();

        // Inbound pump: frames from the child into the shared router queue
        let inbound_id = worker_id.clone();
        let inbound_tx = events.clone();
        tokio::spawn(async move {
            let mut reader = ChannelReader::new(read_half);
            loop {
                match reader.recv().await {
                    Ok(envelope) => {
                        let event =
                            SupervisorEvent::Inbound { from: inbound_id.clone(), envelope };
                        if inbound_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(ProtocolError::ChannelClosed) => break,
                    Err(e) => {
                        warn!(worker = %inbound_id, error = %e, "worker channel read failed");
                        break;
                    }
                }
            }
        });

        // Outbound pump: envelopes from the supervisor onto the socket
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(OUTBOUND_DEPTH);
        let outbound_id = worker_id.clone();
        tokio::spawn(async move {
            let mut writer = ChannelWriter::new(write_half);
            while let Some(envelope) = outbound_rx.recv().await {
                if let Err(e) = writer.send(&envelope).await {
                    error!(
                        worker = %outbound_id,
                        message_id = %envelope.message_id,
                        error = %e,
                        "channel send failed"
                    );
                    break;
                }
            }
        });

        // Exit watcher: report the exit so the engine can replace the child
        let exit_id = worker_id.clone();
        tokio::spawn(async move {
            let exit_code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(worker = %exit_id, error = %e, "failed to wait on worker process");
                    None
                }
            };
            let _ = events
                .send(SupervisorEvent::WorkerExited { worker: exit_id, exit_code })
                .await;
        });

        info!(worker = %worker_id, kind = %kind, pid, "worker spawned");
        Ok(SpawnedWorker { worker_id, pid, outbound: outbound_tx })
    }

    async fn kill(&self, worker: &WorkerId, pid: u32) {
        if pid == 0 {
            warn!(worker = %worker, "no PID recorded; cannot signal worker");
            return;
        }
        let target = nix::unistd::Pid::from_raw(pid as i32);
        if let Err(e) = nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGTERM) {
            warn!(worker = %worker, pid, error = %e, "failed to signal worker");
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreman worker process.
//!
//! Spawned by the supervisor with `FOREMAN_WORKER_KIND` naming its kind and
//! `FOREMAN_CHANNEL` pointing at the duplex channel socket. Never started
//! by hand.

use foreman_core::WorkerKind;
use foreman_worker::{handlers_for, WorkerRuntime};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{error, info};

/// Environment variable naming this worker's kind.
const ENV_WORKER_KIND: &str = "FOREMAN_WORKER_KIND";

/// Environment variable carrying the channel socket path.
const ENV_CHANNEL: &str = "FOREMAN_CHANNEL";

#[tokio::main]
async fn main() {
    setup_logging();

    let kind = match std::env::var(ENV_WORKER_KIND).ok().as_deref().and_then(WorkerKind::from_wire)
    {
        Some(kind) => kind,
        None => {
            error!("{} is unset or names an undeclared kind", ENV_WORKER_KIND);
            std::process::exit(2);
        }
    };
    let socket_path = match std::env::var(ENV_CHANNEL) {
        Ok(path) => path,
        Err(_) => {
            error!("{} is unset", ENV_CHANNEL);
            std::process::exit(2);
        }
    };

    let stream = match connect(&socket_path).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(socket = %socket_path, error = %e, "could not open supervisor channel");
            std::process::exit(1);
        }
    };
    let (reader, writer) = stream.into_split();

    let runtime = WorkerRuntime::new(kind, handlers_for(kind));
    info!(kind = %kind, instance_id = %runtime.instance_id(), "worker ready");

    match runtime.run(reader, writer).await {
        Ok(()) => {}
        Err(e) => {
            error!(error = %e, "worker failed");
            std::process::exit(1);
        }
    }
}

/// Connect to the supervisor's socket, retrying briefly in case the parent
/// is still between spawn and accept.
async fn connect(path: &str) -> std::io::Result<UnixStream> {
    let mut last_err = None;
    for _ in 0..40 {
        match UnixStream::connect(path).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("connect retries exhausted")))
}

/// Workers log to stderr; the supervisor inherits and aggregates streams.
fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_env("FOREMAN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

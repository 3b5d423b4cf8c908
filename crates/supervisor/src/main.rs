// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreman supervisor daemon (foremand)
//!
//! Parent process that owns the worker fleet and all inter-worker routing.
//!
//! Architecture:
//! - Pump tasks: per-child socket I/O feeding the shared event queue
//! - Supervisor loop: main task processing events sequentially

use foreman_supervisor::lifecycle::{self, Config, LifecycleError, StartupResult};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("foremand {}", foreman_supervisor::env::VERSION);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("foremand {}", foreman_supervisor::env::VERSION);
                println!("Foreman supervisor - spawns and coordinates the worker fleet");
                println!();
                println!("USAGE:");
                println!("    foremand");
                println!();
                println!("Configuration is read from the environment (FOREMAN_STATE_DIR,");
                println!("FOREMAN_WORKER_BIN, FOREMAN_LOG, per-worker overrides).");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: foremand [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    std::fs::create_dir_all(&config.state_dir)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting supervisor");

    let StartupResult { mut supervisor, mut events, lock_file: _lock_file } =
        match lifecycle::startup(&config) {
            Ok(r) => r,
            Err(LifecycleError::LockFailed(_)) => {
                let pid = std::fs::read_to_string(&config.lock_path)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                eprintln!("foremand is already running");
                if !pid.is_empty() {
                    eprintln!("  pid: {pid}");
                }
                std::process::exit(1);
            }
            Err(e) => {
                error!("failed to start supervisor: {}", e);
                return Err(e.into());
            }
        };

    if let Err(e) = supervisor.boot().await {
        error!("fleet boot failed: {}", e);
        supervisor.shutdown().await;
        lifecycle::cleanup(&config);
        return Err(e.into());
    }
    supervisor.start_watchdog();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(state_dir = %config.state_dir.display(), "supervisor ready");

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => supervisor.handle_event(event).await,
                None => break,
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }
        }
    }

    supervisor.shutdown().await;
    lifecycle::cleanup(&config);
    Ok(())
}

/// Install the env-filtered subscriber writing to the supervisor log file.
fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let log_dir = config.log_path.parent().unwrap_or(&config.state_dir);
    let log_name = config
        .log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "supervisor.log".to_string());
    let appender = tracing_appender::rolling::never(log_dir, log_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("FOREMAN_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

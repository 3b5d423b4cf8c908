// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! foreman-supervisor: the process-fleet coordination core.
//!
//! The supervisor spawns one child process per declared worker kind, owns the
//! duplex channel to each child, and routes every inbound envelope to zero or
//! more destination workers. It is a single actor: one task consumes the
//! shared event queue and serializes all mutations of the registry and the
//! pending table, so neither needs a lock.
//!
//! Architecture:
//! - Pump tasks: one reader task per child feeding the shared event queue,
//!   one writer task per child draining that child's outbound channel
//! - Supervisor loop: single consumer applying routing, lifecycle, and
//!   watchdog decisions

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
mod journal;
pub mod lifecycle;
mod pending;
mod probe;
mod registry;
mod router;
mod spawn;
mod supervisor;

pub use journal::{JournalError, PendingJournal};
pub use pending::{PendingEntry, PendingTable};
pub use probe::{parse_ps_state, PsSchedProbe, SchedProbe, SchedState};
pub use registry::{Registry, WorkerRecord};
pub use spawn::{ProcessSpawner, SpawnError, SpawnedWorker, Spawner};
pub use supervisor::{
    Supervisor, SupervisorEvent, HEARTBEAT_INTERVAL, RETRY_DELAY, WATCHDOG_INTERVAL,
    WATCHDOG_THRESHOLD,
};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

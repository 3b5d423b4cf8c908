// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! foreman-worker: the worker-side contract every child process satisfies.
//!
//! A worker connects the duplex channel its supervisor opened for it, beats
//! every 10 seconds, filters inbound destinations down to its own kind, and
//! dispatches the surviving entries through a handler table keyed by method
//! name. Replies carry the original message ID and name the next hop.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod handlers;
mod relay;
mod runtime;
mod store;

pub use handlers::{Handler, HandlerTable, Reply};
pub use relay::relay_handlers;
pub use runtime::{WorkerError, WorkerRuntime};
pub use store::store_handlers;

use foreman_core::WorkerKind;

/// Build the handler set for a kind.
///
/// The Database kind runs the in-memory project store; the front-end kinds
/// run the relay set (their real servers are external collaborators that
/// speak the same contract).
pub fn handlers_for(kind: WorkerKind) -> HandlerTable {
    match kind {
        WorkerKind::Database => store_handlers(),
        WorkerKind::Http | WorkerKind::Queue | WorkerKind::GraphQl => relay_handlers(kind),
    }
}

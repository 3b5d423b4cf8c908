// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay handler set for the front-end kinds.
//!
//! The HTTP, queue, and GraphQL servers are external collaborators; a relay
//! worker stands in for them on the fabric, accepting their continuation
//! methods, logging the payload, and acking so the pending table clears.

use crate::handlers::{HandlerTable, Reply};
use foreman_core::{Envelope, WorkerKind, SUPERVISOR};
use tracing::info;

/// Handler set for the Http, Queue, and GraphQl kinds.
pub fn relay_handlers(kind: WorkerKind) -> HandlerTable {
    let mut table = HandlerTable::new();

    for method in ["onProcessedMessage", "produceMessage"] {
        table.register(method, move |_arg: Option<&str>, envelope: &Envelope| {
            info!(
                kind = %kind,
                method,
                message_id = %envelope.message_id,
                data = %envelope.data,
                "relayed message consumed"
            );
            Reply::completed(vec![SUPERVISOR.to_string()], serde_json::Value::Null)
        });
    }

    table
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

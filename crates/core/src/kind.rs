// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of worker kinds the supervisor routes between.
//!
//! The wire envelope carries kinds as strings (`DatabaseWorker`, ...); inside
//! the supervisor everything is this enum. Unknown strings on the wire are a
//! parse error at the destination layer, never a panic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named class of interchangeable worker processes; the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkerKind {
    #[serde(rename = "DatabaseWorker")]
    Database,
    #[serde(rename = "HttpWorker")]
    Http,
    #[serde(rename = "QueueWorker")]
    Queue,
    #[serde(rename = "GraphQLWorker")]
    GraphQl,
}

impl WorkerKind {
    /// Every declared kind, in boot order.
    pub const ALL: [WorkerKind; 4] =
        [WorkerKind::Database, WorkerKind::Http, WorkerKind::Queue, WorkerKind::GraphQl];

    /// The wire form used in destination strings.
    pub fn as_wire(&self) -> &'static str {
        match self {
            WorkerKind::Database => "DatabaseWorker",
            WorkerKind::Http => "HttpWorker",
            WorkerKind::Queue => "QueueWorker",
            WorkerKind::GraphQl => "GraphQLWorker",
        }
    }

    /// Parse a wire-form kind name. Returns `None` for undeclared kinds.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_wire() == s)
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

#[cfg(test)]
#[path = "kind_tests.rs"]
mod tests;

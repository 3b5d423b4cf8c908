// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination grammar: `"supervisor" | WorkerType ("/" Segment)*`.
//!
//! The router only ever looks at the text before the first `/`, which is the
//! routing key. The remaining segments (method, optional argument) are opaque
//! to the router and interpreted by the receiving worker.

use crate::envelope::SUPERVISOR;
use crate::kind::WorkerKind;
use thiserror::Error;

/// Where a single destination entry routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The coordination core itself.
    Supervisor,
    /// A worker of the given kind.
    Peer(WorkerKind),
}

/// Destination parse errors.
#[derive(Debug, Error, PartialEq)]
pub enum DestinationError {
    #[error("empty destination")]
    Empty,

    #[error("unknown worker type: {0}")]
    UnknownKind(String),
}

/// A parsed destination entry.
///
/// Keeps the raw string so forwarded copies carry the remainder verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    raw: String,
    target: Target,
    method: Option<String>,
    arg: Option<String>,
}

impl Destination {
    /// Parse one destination string.
    pub fn parse(raw: &str) -> Result<Self, DestinationError> {
        if raw.is_empty() {
            return Err(DestinationError::Empty);
        }

        let (key, rest) = match raw.split_once('/') {
            Some((key, rest)) => (key, Some(rest)),
            None => (raw, None),
        };

        if key == SUPERVISOR {
            return Ok(Self {
                raw: raw.to_string(),
                target: Target::Supervisor,
                method: None,
                arg: None,
            });
        }

        let kind = WorkerKind::from_wire(key)
            .ok_or_else(|| DestinationError::UnknownKind(key.to_string()))?;

        let (method, arg) = match rest {
            None | Some("") => (None, None),
            Some(rest) => match rest.split_once('/') {
                Some((method, arg)) => (Some(method.to_string()), Some(arg.to_string())),
                None => (Some(rest.to_string()), None),
            },
        };

        Ok(Self { raw: raw.to_string(), target: Target::Peer(kind), method, arg })
    }

    /// The raw destination string, exactly as it appeared on the wire.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// The worker kind for peer destinations.
    pub fn kind(&self) -> Option<WorkerKind> {
        match self.target {
            Target::Peer(kind) => Some(kind),
            Target::Supervisor => None,
        }
    }

    /// The method segment, when present.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Everything after the method segment, forwarded verbatim.
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

/// The routing key of a destination string: the text before the first `/`.
pub fn routing_key(raw: &str) -> &str {
    raw.split('/').next().unwrap_or(raw)
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;

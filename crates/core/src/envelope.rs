// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message envelope, the single in-transit record of the system.
//!
//! Serialized as a JSON object with the exact wire field names `messageId`,
//! `status`, `reason`, `destination`, `data`. Every parent↔child frame is one
//! envelope.

use crate::id::MessageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason code a saturated worker replies with to decline a message.
pub const SERVER_BUSY: &str = "SERVER_BUSY";

/// Reason code for a read that matched nothing.
pub const NO_DATA: &str = "NO_DATA";

/// The literal destination that routes to the coordination core itself.
pub const SUPERVISOR: &str = "supervisor";

/// Terminal status of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Completed,
    Failed,
    Error,
    Healthy,
}

/// Envelope construction errors.
#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("messageId must be non-empty")]
    EmptyMessageId,

    #[error("a routed envelope must name at least one destination")]
    NoDestination,
}

/// The serializable record carried on every channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Build a routed envelope, enforcing the non-empty invariants.
    pub fn new(
        message_id: MessageId,
        status: Status,
        destination: Vec<String>,
        data: serde_json::Value,
    ) -> Result<Self, EnvelopeError> {
        if message_id.is_empty() {
            return Err(EnvelopeError::EmptyMessageId);
        }
        if destination.is_empty() {
            return Err(EnvelopeError::NoDestination);
        }
        Ok(Self { message_id, status, reason: None, destination, data })
    }

    /// A `completed` reply carrying a result toward its next hops.
    pub fn completed(
        message_id: MessageId,
        destination: Vec<String>,
        data: serde_json::Value,
    ) -> Result<Self, EnvelopeError> {
        Self::new(message_id, Status::Completed, destination, data)
    }

    /// A `failed` reply with a short reason code.
    pub fn failed(
        message_id: MessageId,
        reason: impl Into<String>,
        destination: Vec<String>,
    ) -> Result<Self, EnvelopeError> {
        let mut env = Self::new(message_id, Status::Failed, destination, serde_json::Value::Null)?;
        env.reason = Some(reason.into());
        Ok(env)
    }

    /// A non-recoverable worker error, addressed to the supervisor.
    pub fn error(message_id: MessageId, reason: impl Into<String>) -> Self {
        Self {
            message_id,
            status: Status::Error,
            reason: Some(reason.into()),
            destination: vec![SUPERVISOR.to_string()],
            data: serde_json::Value::Null,
        }
    }

    /// A health beat: `{instanceId, timestamp}` addressed to the supervisor.
    pub fn healthy(instance_id: &str, timestamp_ms: u64) -> Self {
        Self {
            message_id: MessageId::generate(),
            status: Status::Healthy,
            reason: None,
            destination: vec![SUPERVISOR.to_string()],
            data: serde_json::json!({ "instanceId": instance_id, "timestamp": timestamp_ms }),
        }
    }

    /// Copy of this envelope narrowed to a single destination.
    ///
    /// The router fans out per destination; each forwarded copy carries
    /// exactly the one entry it was routed for.
    pub fn with_destination(&self, destination: String) -> Self {
        let mut copy = self.clone();
        copy.destination = vec![destination];
        copy
    }

    /// True when this is a pure pending-table ack: `completed`, addressed
    /// only to the supervisor.
    pub fn is_ack(&self) -> bool {
        self.status == Status::Completed
            && self.destination.iter().all(|d| d == SUPERVISOR)
            && !self.destination.is_empty()
    }

    /// True when this is a heartbeat envelope.
    pub fn is_heartbeat(&self) -> bool {
        self.status == Status::Healthy
    }

    /// The `SERVER_BUSY` back-off reply for a message this worker declined.
    pub fn server_busy(message_id: MessageId, declined_destination: String) -> Self {
        Self {
            message_id,
            status: Status::Failed,
            reason: Some(SERVER_BUSY.to_string()),
            destination: vec![declined_destination],
            data: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler table: a worker's operations keyed by method name.
//!
//! Destinations resolve to `(method, arg)` pairs; the table dispatches with
//! a typed signature and answers unknown methods with a `failed` reply
//! rather than panicking.

use foreman_core::{Envelope, Status, SUPERVISOR};
use std::collections::BTreeMap;

/// What a handler hands back to the runtime.
///
/// The runtime builds the outgoing envelope from it, reusing the inbound
/// message ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: Status,
    pub reason: Option<String>,
    pub destination: Vec<String>,
    pub data: serde_json::Value,
}

impl Reply {
    /// A `completed` reply carrying `data` toward `destination`.
    pub fn completed(destination: Vec<String>, data: serde_json::Value) -> Self {
        Self { status: Status::Completed, reason: None, destination, data }
    }

    /// A `failed` reply with a short reason code, acked to the supervisor.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            reason: Some(reason.into()),
            destination: vec![SUPERVISOR.to_string()],
            data: serde_json::Value::Null,
        }
    }
}

/// One worker operation: `(arg, inbound envelope) → reply`.
pub trait Handler: Send {
    fn call(&mut self, arg: Option<&str>, envelope: &Envelope) -> Reply;
}

impl<F> Handler for F
where
    F: FnMut(Option<&str>, &Envelope) -> Reply + Send,
{
    fn call(&mut self, arg: Option<&str>, envelope: &Envelope) -> Reply {
        self(arg, envelope)
    }
}

/// A worker's operations, keyed by the method segment of a destination.
#[derive(Default)]
pub struct HandlerTable {
    handlers: BTreeMap<String, Box<dyn Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under a method name.
    pub fn register(&mut self, method: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(method.into(), Box::new(handler));
    }

    /// Invoke the operation a destination names.
    ///
    /// A missing method segment or an unregistered method is a `failed`
    /// reply; dispatch itself never panics.
    pub fn dispatch(&mut self, method: Option<&str>, arg: Option<&str>, envelope: &Envelope) -> Reply {
        let Some(method) = method else {
            return Reply::failed("NO_METHOD");
        };
        match self.handlers.get_mut(method) {
            Some(handler) => handler.call(arg, envelope),
            None => Reply::failed(format!("UNKNOWN_METHOD {method}")),
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static fleet configuration: which worker kinds exist, how many of each,
//! and the flat key/value config injected into each child's environment.
//!
//! Loaded once at supervisor init and immutable during a run. There is no
//! dynamic worker-type discovery.

use crate::kind::WorkerKind;
use std::collections::BTreeMap;

/// Per-kind startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    pub kind: WorkerKind,
    /// Desired number of instances at boot. Must be at least 1.
    pub count: u32,
    /// Flat key/value map passed through the child process environment.
    pub config: BTreeMap<String, String>,
}

impl WorkerDescriptor {
    pub fn new(kind: WorkerKind, count: u32) -> Self {
        Self { kind, count, config: default_config(kind) }
    }

    /// Override a single config entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// The full declared fleet.
#[derive(Debug, Clone, Default)]
pub struct FleetDescriptor {
    pub workers: Vec<WorkerDescriptor>,
}

impl FleetDescriptor {
    /// One instance of every declared kind with its default config.
    pub fn standard() -> Self {
        Self { workers: WorkerKind::ALL.iter().map(|k| WorkerDescriptor::new(*k, 1)).collect() }
    }

    pub fn get(&self, kind: WorkerKind) -> Option<&WorkerDescriptor> {
        self.workers.iter().find(|w| w.kind == kind)
    }

    /// The config map to inject when spawning a worker of `kind`.
    ///
    /// Falls back to the kind's defaults for kinds that were not declared,
    /// so a spawn-on-absence never fails for want of configuration.
    pub fn config_for(&self, kind: WorkerKind) -> BTreeMap<String, String> {
        self.get(kind).map(|w| w.config.clone()).unwrap_or_else(|| default_config(kind))
    }
}

fn default_config(kind: WorkerKind) -> BTreeMap<String, String> {
    let mut config = BTreeMap::new();
    match kind {
        WorkerKind::Database => {
            config.insert("db_url".to_string(), "mongodb://localhost:27017".to_string());
            config.insert("db_name".to_string(), "projects".to_string());
            config.insert("collection_name".to_string(), "project".to_string());
        }
        WorkerKind::Http => {
            config.insert("port".to_string(), "4000".to_string());
            config.insert("jwt_secret".to_string(), String::new());
        }
        WorkerKind::Queue => {
            config.insert("consumeQueue".to_string(), "project.crawl.result".to_string());
            config
                .insert("consumeCompensationQueue".to_string(), "project.compensation".to_string());
            config.insert("produceQueue".to_string(), "project.crawl".to_string());
            config.insert("rabbitMqUrl".to_string(), "amqp://localhost:5672".to_string());
        }
        WorkerKind::GraphQl => {
            config.insert("graphql_port".to_string(), "4001".to_string());
            config.insert("jwt_secret".to_string(), String::new());
        }
    }
    config
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference database worker: an in-memory project document store.
//!
//! Demonstrates the full worker contract: `createNewData` inserts and fans
//! its reply out to the HTTP front-end and the queue producer;
//! `getDataById/<id>` and `getData` answer reads toward the requester's
//! `replyTo` destinations (defaulting to the HTTP front-end).

use crate::handlers::{HandlerTable, Reply};
use foreman_core::{Envelope, NO_DATA};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// In-memory document collection, keyed by `_id`.
#[derive(Default)]
struct ProjectStore {
    documents: BTreeMap<String, serde_json::Value>,
}

impl ProjectStore {
    fn insert(&mut self, mut document: serde_json::Value) -> serde_json::Value {
        let id = nanoid::nanoid!(12);
        if let Some(obj) = document.as_object_mut() {
            obj.insert("_id".to_string(), serde_json::Value::String(id.clone()));
        }
        self.documents.insert(id, document.clone());
        document
    }

    fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.documents.get(id)
    }

    fn all(&self) -> Vec<serde_json::Value> {
        self.documents.values().cloned().collect()
    }
}

/// Destinations a read reply should travel to.
///
/// Honors a `replyTo` array in the request data; defaults to the HTTP
/// front-end's continuation method.
fn reply_destinations(envelope: &Envelope) -> Vec<String> {
    if let Some(reply_to) = envelope.data.get("replyTo").and_then(|v| v.as_array()) {
        let dests: Vec<String> =
            reply_to.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        if !dests.is_empty() {
            return dests;
        }
    }
    vec!["HttpWorker/onProcessedMessage".to_string()]
}

/// The Database kind's handler set.
pub fn store_handlers() -> HandlerTable {
    let store = Arc::new(Mutex::new(ProjectStore::default()));
    let mut table = HandlerTable::new();

    let create_store = Arc::clone(&store);
    table.register("createNewData", move |_arg: Option<&str>, envelope: &Envelope| {
        let document = match envelope.data.get("data") {
            Some(doc) if doc.is_object() => doc.clone(),
            _ if envelope.data.is_object() => envelope.data.clone(),
            _ => return Reply::failed(NO_DATA),
        };
        let inserted = create_store.lock().insert(document);
        info!(id = ?inserted.get("_id"), "document inserted");
        Reply::completed(
            vec![
                "HttpWorker/onProcessedMessage".to_string(),
                "QueueWorker/produceMessage".to_string(),
            ],
            inserted,
        )
    });

    let get_store = Arc::clone(&store);
    table.register("getDataById", move |arg: Option<&str>, envelope: &Envelope| {
        let Some(id) = arg else {
            return Reply::failed(NO_DATA);
        };
        match get_store.lock().get(id) {
            Some(document) => Reply::completed(reply_destinations(envelope), document.clone()),
            None => Reply::failed(NO_DATA),
        }
    });

    let list_store = Arc::clone(&store);
    table.register("getData", move |_arg: Option<&str>, envelope: &Envelope| {
        let documents = list_store.lock().all();
        if documents.is_empty() {
            return Reply::failed(NO_DATA);
        }
        Reply::completed(reply_destinations(envelope), serde_json::Value::Array(documents))
    });

    table
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

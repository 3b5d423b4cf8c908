// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level specs: the coordination fabric end to end.
//!
//! The supervisor engine runs against the in-memory spawner while real
//! worker runtimes (the reference store worker included) are driven over
//! duplex streams, covering the scenarios that span crate boundaries.

use std::time::Duration;

use foreman_core::{Envelope, FleetDescriptor, MessageId, Status, WorkerDescriptor, WorkerKind};
use foreman_core::{FakeClock, WorkerId};
use foreman_supervisor::test_support::{drain_events, routed_envelope, FakeSchedProbe, FakeSpawner};
use foreman_supervisor::{PendingTable, Supervisor, SupervisorEvent};
use foreman_wire::Channel;
use foreman_worker::{handlers_for, store_handlers, HandlerTable, WorkerRuntime};
use tokio::io::{ReadHalf, WriteHalf};

type ParentChannel = Channel<ReadHalf<tokio::io::DuplexStream>, WriteHalf<tokio::io::DuplexStream>>;

fn boot_worker(kind: WorkerKind, handlers: HandlerTable) -> ParentChannel {
    let (parent, child) = tokio::io::duplex(64 * 1024);
    let (child_r, child_w) = tokio::io::split(child);
    let runtime = WorkerRuntime::new(kind, handlers);
    tokio::spawn(async move {
        let _ = runtime.run(child_r, child_w).await;
    });
    let (parent_r, parent_w) = tokio::io::split(parent);
    Channel::new(parent_r, parent_w)
}

async fn recv_reply(channel: &mut ParentChannel) -> Envelope {
    loop {
        let env = tokio::time::timeout(Duration::from_secs(2), channel.recv())
            .await
            .expect("no reply within 2s")
            .expect("channel closed");
        if !env.is_heartbeat() {
            return env;
        }
    }
}

fn request(id: &str, destination: &str, data: serde_json::Value) -> Envelope {
    Envelope::new(MessageId::new(id), Status::Completed, vec![destination.to_string()], data)
        .unwrap()
}

type TestSupervisor = Supervisor<FakeSpawner, FakeSchedProbe, FakeClock>;

async fn deliver(supervisor: &mut TestSupervisor, from: &WorkerId, envelope: Envelope) {
    supervisor
        .handle_event(SupervisorEvent::Inbound { from: from.clone(), envelope })
        .await;
}

// Create-project flow against the reference store worker: the insert reply
// names both continuation hops and carries the supervisor ack.
#[tokio::test]
async fn create_project_reply_names_both_continuations() {
    let mut db = boot_worker(WorkerKind::Database, store_handlers());

    db.send(&request(
        "req-1",
        "DatabaseWorker/createNewData",
        serde_json::json!({
            "title": "T", "description": "D", "keyword": "k", "category": "c",
            "language": "en", "tweetToken": "tok",
            "start_date_crawl": "2023-01-01", "end_date_crawl": "2023-12-31"
        }),
    ))
    .await
    .unwrap();

    let reply = recv_reply(&mut db).await;
    assert_eq!(reply.message_id, "req-1");
    assert_eq!(reply.status, Status::Completed);
    assert!(reply.data["_id"].is_string());
    assert_eq!(reply.data["keyword"], "k");
    let dests = &reply.destination;
    assert!(dests.iter().any(|d| d == "HttpWorker/onProcessedMessage"));
    assert!(dests.iter().any(|d| d == "QueueWorker/produceMessage"));
    assert!(dests.iter().any(|d| d == "supervisor"));
}

// Entity-reference flow: a read addressed back to the GraphQL worker.
#[tokio::test]
async fn entity_reference_resolution_replies_to_graphql() {
    let mut db = boot_worker(WorkerKind::Database, store_handlers());

    db.send(&request(
        "req-1",
        "DatabaseWorker/createNewData",
        serde_json::json!({"title": "T"}),
    ))
    .await
    .unwrap();
    let created = recv_reply(&mut db).await;
    let id = created.data["_id"].as_str().unwrap().to_string();

    db.send(&request(
        "req-2",
        &format!("DatabaseWorker/getDataById/{id}"),
        serde_json::json!({"replyTo": ["GraphQLWorker/onProcessedMessage"]}),
    ))
    .await
    .unwrap();

    let reply = recv_reply(&mut db).await;
    assert_eq!(reply.message_id, "req-2");
    assert_eq!(reply.status, Status::Completed);
    assert_eq!(reply.data["_id"], id.as_str());
    assert!(reply.destination.iter().any(|d| d == "GraphQLWorker/onProcessedMessage"));
}

// The relay set every front-end kind runs consumes continuations and acks.
#[tokio::test]
async fn relay_worker_consumes_continuations() {
    let mut queue = boot_worker(WorkerKind::Queue, handlers_for(WorkerKind::Queue));

    queue
        .send(&request(
            "req-1",
            "QueueWorker/produceMessage",
            serde_json::json!({"projectId": "X", "keyword": "k"}),
        ))
        .await
        .unwrap();

    let ack = recv_reply(&mut queue).await;
    assert_eq!(ack.message_id, "req-1");
    assert_eq!(ack.status, Status::Completed);
    assert_eq!(ack.destination, vec!["supervisor".to_string()]);
}

// SERVER_BUSY fail-over across the supervisor engine.
#[tokio::test]
async fn busy_database_worker_fails_over_to_its_sibling() {
    let fleet = FleetDescriptor {
        workers: vec![
            WorkerDescriptor::new(WorkerKind::Http, 1),
            WorkerDescriptor::new(WorkerKind::Database, 2),
        ],
    };
    let spawner = FakeSpawner::new();
    let (mut supervisor, _events) = Supervisor::new(
        spawner.clone(),
        FakeSchedProbe::new(),
        FakeClock::new(),
        fleet,
        PendingTable::new(),
        None,
    );
    supervisor.boot().await.unwrap();

    let http = spawner.workers_of(WorkerKind::Http)[0].clone();
    let db_workers = spawner.workers_of(WorkerKind::Database);
    let (db_a, db_b) = (db_workers[0].clone(), db_workers[1].clone());

    deliver(&mut supervisor, &http, routed_envelope("m1", "DatabaseWorker/createNewData")).await;
    assert_eq!(spawner.drain_sent(&db_a).len(), 1);

    let busy = Envelope::server_busy(MessageId::new("m1"), "DatabaseWorker/createNewData".into());
    deliver(&mut supervisor, &db_a, busy).await;

    let rerouted = spawner.drain_sent(&db_b);
    assert_eq!(rerouted.len(), 1);
    assert_eq!(rerouted[0].message_id, "m1");
    assert!(supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
}

// Worker crash replay across the supervisor engine.
#[tokio::test]
async fn database_crash_replays_in_flight_work_to_the_replacement() {
    let fleet = FleetDescriptor {
        workers: vec![
            WorkerDescriptor::new(WorkerKind::Http, 1),
            WorkerDescriptor::new(WorkerKind::Database, 1),
        ],
    };
    let spawner = FakeSpawner::new();
    let (mut supervisor, mut events) = Supervisor::new(
        spawner.clone(),
        FakeSchedProbe::new(),
        FakeClock::new(),
        fleet,
        PendingTable::new(),
        None,
    );
    supervisor.boot().await.unwrap();

    let http = spawner.workers_of(WorkerKind::Http)[0].clone();
    let db = spawner.workers_of(WorkerKind::Database)[0].clone();

    deliver(&mut supervisor, &http, routed_envelope("m2", "DatabaseWorker/createNewData")).await;
    assert_eq!(spawner.drain_sent(&db).len(), 1);

    spawner.simulate_exit(&db, Some(1)).await;
    drain_events(&mut supervisor, &mut events).await;

    let replacement = spawner.workers_of(WorkerKind::Database)[1].clone();
    let replayed = spawner.drain_sent(&replacement);
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].message_id, "m2");

    let ack = Envelope::completed(
        MessageId::new("m2"),
        vec!["supervisor".to_string()],
        serde_json::Value::Null,
    )
    .unwrap();
    deliver(&mut supervisor, &replacement, ack).await;
    assert!(supervisor.pending().is_empty());
}

// Pending journal persistence across a supervisor restart.
#[tokio::test]
async fn journal_restores_in_flight_work_across_supervisor_restart() {
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("journal").join("pending.jsonl");
    let fleet =
        FleetDescriptor { workers: vec![WorkerDescriptor::new(WorkerKind::Database, 1)] };

    // First run: track a message, then "crash" (drop without acking)
    {
        let (journal, pending) =
            foreman_supervisor::PendingJournal::open(&journal_path, 0).unwrap();
        let spawner = FakeSpawner::new();
        let (mut supervisor, _events) = Supervisor::new(
            spawner.clone(),
            FakeSchedProbe::new(),
            FakeClock::new(),
            fleet.clone(),
            pending,
            Some(journal),
        );
        supervisor.boot().await.unwrap();
        let db = spawner.workers_of(WorkerKind::Database)[0].clone();
        deliver(&mut supervisor, &db, routed_envelope("m9", "DatabaseWorker/createNewData"))
            .await;
    }

    // Second run: replay finds the message; boot drains it to the new fleet
    let (journal, pending) = foreman_supervisor::PendingJournal::open(&journal_path, 0).unwrap();
    assert!(pending.contains(WorkerKind::Database, &MessageId::new("m9")));

    let spawner = FakeSpawner::new();
    let (mut supervisor, _events) = Supervisor::new(
        spawner.clone(),
        FakeSchedProbe::new(),
        FakeClock::new(),
        fleet,
        pending,
        Some(journal),
    );
    supervisor.boot().await.unwrap();

    let db = spawner.workers_of(WorkerKind::Database)[0].clone();
    let replayed = spawner.drain_sent(&db);
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].message_id, "m9");
}

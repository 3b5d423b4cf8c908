// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router behavior: acks, fail-over, back-off, spawn-on-absence, no revival.

use crate::test_support::{drain_events, routed_envelope, FakeSchedProbe, FakeSpawner};
use crate::{SchedState, Supervisor, SupervisorEvent};
use foreman_core::{
    Envelope, FakeClock, FleetDescriptor, MessageId, Status, WorkerId, WorkerKind,
};
use std::time::Duration;
use tokio::sync::mpsc;

type TestSupervisor = Supervisor<FakeSpawner, FakeSchedProbe, FakeClock>;

struct Fixture {
    supervisor: TestSupervisor,
    events: mpsc::Receiver<SupervisorEvent>,
    spawner: FakeSpawner,
    probe: FakeSchedProbe,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let spawner = FakeSpawner::new();
    let probe = FakeSchedProbe::new();
    let clock = FakeClock::new();
    let (supervisor, events) = Supervisor::new(
        spawner.clone(),
        probe.clone(),
        clock.clone(),
        FleetDescriptor::standard(),
        crate::PendingTable::new(),
        None,
    );
    Fixture { supervisor, events, spawner, probe, clock }
}

impl Fixture {
    async fn add_worker(&mut self, kind: WorkerKind) -> WorkerId {
        let config = self.supervisor.fleet.config_for(kind);
        self.supervisor.create_worker(kind, 1, config).await.unwrap();
        self.spawner.last_worker().unwrap()
    }
}

#[tokio::test]
async fn forwards_to_the_first_alive_candidate() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db_a = fx.add_worker(WorkerKind::Database).await;
    let _db_b = fx.add_worker(WorkerKind::Database).await;

    let env = routed_envelope("m1", "DatabaseWorker/createNewData");
    fx.supervisor.on_worker_message(&http, env).await;

    let sent = fx.spawner.drain_sent(&db_a);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_id, "m1");
    assert_eq!(sent[0].destination, vec!["DatabaseWorker/createNewData".to_string()]);
    assert!(fx.supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
}

#[tokio::test]
async fn completed_ack_clears_the_pending_entry() {
    // Round-trip property: ack removes (kind, messageId) from the table.
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db = fx.add_worker(WorkerKind::Database).await;

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;
    assert_eq!(fx.supervisor.pending().len(WorkerKind::Database), 1);

    let ack = Envelope::completed(
        MessageId::new("m1"),
        vec!["supervisor".to_string()],
        serde_json::json!({"_id": "X"}),
    )
    .unwrap();
    fx.supervisor.on_worker_message(&db, ack).await;

    assert!(!fx.supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
}

#[tokio::test]
async fn completed_reply_without_supervisor_destination_still_acks() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db = fx.add_worker(WorkerKind::Database).await;

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;

    // Reply fans out to peers only; the sender's entry must still clear.
    let reply = Envelope::completed(
        MessageId::new("m1"),
        vec!["HttpWorker/onProcessedMessage".to_string()],
        serde_json::json!({"_id": "X"}),
    )
    .unwrap();
    fx.supervisor.on_worker_message(&db, reply).await;

    assert!(!fx.supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
    // The fan-out leg was forwarded to the HTTP worker and is now pending there.
    assert!(fx.supervisor.pending().contains(WorkerKind::Http, &MessageId::new("m1")));
    assert_eq!(fx.spawner.drain_sent(&http).len(), 1);
}

#[tokio::test]
async fn server_busy_reroutes_to_a_sibling() {
    // Back-pressure property: the saturated sender is excluded.
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db_a = fx.add_worker(WorkerKind::Database).await;
    let db_b = fx.add_worker(WorkerKind::Database).await;

    let mut original = routed_envelope("m1", "DatabaseWorker/createNewData");
    original.data = serde_json::json!({"title": "T"});
    fx.supervisor.on_worker_message(&http, original).await;
    assert_eq!(fx.spawner.drain_sent(&db_a).len(), 1);

    // A declines: bounces the message with SERVER_BUSY
    let busy = Envelope::server_busy(
        MessageId::new("m1"),
        "DatabaseWorker/createNewData".to_string(),
    );
    fx.supervisor.on_worker_message(&db_a, busy).await;

    let sent_b = fx.spawner.drain_sent(&db_b);
    assert_eq!(sent_b.len(), 1);
    assert_eq!(sent_b[0].message_id, "m1");
    // B gets the tracked original work, not the empty bounce frame
    assert_eq!(sent_b[0].status, Status::Completed);
    assert_eq!(sent_b[0].data["title"], "T");
    assert!(fx.spawner.drain_sent(&db_a).is_empty(), "sender must not get its work back");
    // Still pending until B acks
    assert!(fx.supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
}

#[tokio::test]
async fn server_busy_with_no_sibling_backs_off_and_retries() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db = fx.add_worker(WorkerKind::Database).await;
    fx.supervisor.set_retry_delay(Duration::from_millis(10));

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;
    fx.spawner.drain_sent(&db);

    let busy = Envelope::server_busy(
        MessageId::new("m1"),
        "DatabaseWorker/createNewData".to_string(),
    );
    fx.supervisor.on_worker_message(&db, busy).await;
    assert!(fx.spawner.drain_sent(&db).is_empty(), "nothing sent before the back-off");

    // The retry fires on the event queue after the delay
    let event = tokio::time::timeout(Duration::from_secs(1), fx.events.recv())
        .await
        .expect("retry timer never fired")
        .expect("queue closed");
    match &event {
        SupervisorEvent::RetryRoute { kind, envelope, .. } => {
            assert_eq!(*kind, WorkerKind::Database);
            // Re-enters the flow as a plain completed forward
            assert_eq!(envelope.status, Status::Completed);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    fx.supervisor.handle_event(event).await;

    let sent = fx.spawner.drain_sent(&db);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_id, "m1");
}

#[tokio::test]
async fn spawns_capacity_when_no_worker_of_kind_is_alive() {
    // Spawn-on-absence property: one createWorker per starved message.
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    assert_eq!(fx.spawner.attempts(), 1);

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "QueueWorker/produceMessage"))
        .await;

    // Exactly one new spawn, and the drain delivered the message to it
    assert_eq!(fx.spawner.attempts(), 2);
    let queue_workers = fx.spawner.workers_of(WorkerKind::Queue);
    assert_eq!(queue_workers.len(), 1);
    let sent = fx.spawner.drain_sent(&queue_workers[0]);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_id, "m1");
}

#[tokio::test]
async fn dead_workers_are_never_selected() {
    // No-revival property.
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db_a = fx.add_worker(WorkerKind::Database).await;
    let db_b = fx.add_worker(WorkerKind::Database).await;

    // Kill A without processing its exit yet: killed flag alone must exclude it
    fx.supervisor.restart_worker(&db_a).await;

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;

    assert!(fx.spawner.drain_sent(&db_a).is_empty());
    assert_eq!(fx.spawner.drain_sent(&db_b).len(), 1);
}

#[tokio::test]
async fn send_to_closed_channel_is_logged_not_retried_inline() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db = fx.add_worker(WorkerKind::Database).await;

    // Channel closes between the liveness check and the send
    fx.spawner.close_channel(&db);

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;

    // Message stays pending for the next restart-and-drain cycle
    assert!(fx.supervisor.pending().contains(WorkerKind::Database, &MessageId::new("m1")));
    assert!(fx.spawner.drain_sent(&db).is_empty());
}

#[tokio::test]
async fn on_cpu_worker_is_skipped_in_favor_of_idle_sibling() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let db_a = fx.add_worker(WorkerKind::Database).await;
    let db_b = fx.add_worker(WorkerKind::Database).await;

    let pid_a = fx.spawner.pid_of(&db_a).unwrap();
    fx.probe.set(pid_a, SchedState::Running);

    fx.supervisor
        .on_worker_message(&http, routed_envelope("m1", "DatabaseWorker/createNewData"))
        .await;

    assert!(fx.spawner.drain_sent(&db_a).is_empty());
    assert_eq!(fx.spawner.drain_sent(&db_b).len(), 1);
}

#[tokio::test]
async fn error_envelope_restarts_the_sender_and_is_not_forwarded() {
    let mut fx = fixture();
    let db = fx.add_worker(WorkerKind::Database).await;
    let queue = fx.add_worker(WorkerKind::Queue).await;

    let mut env = routed_envelope("m1", "QueueWorker/produceMessage");
    env.status = Status::Error;
    env.reason = Some("broken pipe".to_string());
    fx.supervisor.on_worker_message(&db, env).await;

    assert!(fx.spawner.was_killed(&db));
    assert!(fx.spawner.drain_sent(&queue).is_empty());
    // Intent was recorded before the error was noticed
    assert!(fx.supervisor.pending().contains(WorkerKind::Queue, &MessageId::new("m1")));

    // Exit → replacement → drain delivers the retained work
    drain_events(&mut fx.supervisor, &mut fx.events).await;
    assert_eq!(fx.spawner.workers_of(WorkerKind::Database).len(), 2);
}

#[tokio::test]
async fn heartbeat_updates_liveness_bookkeeping() {
    let mut fx = fixture();
    let db = fx.add_worker(WorkerKind::Database).await;

    fx.clock.set_epoch_ms(50_000);
    let beat = Envelope::healthy("DatabaseWorker-3f2c", 50_000);
    fx.supervisor.on_worker_message(&db, beat).await;

    let record = fx.supervisor.registry().get(&db).unwrap();
    assert_eq!(record.last_beat_ms, Some(50_000));
    assert_eq!(record.instance_id.as_deref(), Some("DatabaseWorker-3f2c"));
}

#[tokio::test]
async fn unknown_destination_kind_is_dropped_without_spawning() {
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let attempts = fx.spawner.attempts();

    fx.supervisor.on_worker_message(&http, routed_envelope("m1", "RedisWorker/get")).await;

    assert_eq!(fx.spawner.attempts(), attempts);
    assert!(fx.supervisor.pending().is_empty());
}

#[tokio::test]
async fn fan_out_routes_each_destination_independently() {
    let mut fx = fixture();
    let db = fx.add_worker(WorkerKind::Database).await;
    let http = fx.add_worker(WorkerKind::Http).await;
    let queue = fx.add_worker(WorkerKind::Queue).await;

    let reply = Envelope::completed(
        MessageId::new("m1"),
        vec![
            "HttpWorker/onProcessedMessage".to_string(),
            "QueueWorker/produceMessage".to_string(),
        ],
        serde_json::json!({"projectId": "X"}),
    )
    .unwrap();
    fx.supervisor.on_worker_message(&db, reply).await;

    let to_http = fx.spawner.drain_sent(&http);
    let to_queue = fx.spawner.drain_sent(&queue);
    assert_eq!(to_http.len(), 1);
    assert_eq!(to_queue.len(), 1);
    // Each copy is narrowed to its own destination
    assert_eq!(to_http[0].destination, vec!["HttpWorker/onProcessedMessage".to_string()]);
    assert_eq!(to_queue[0].destination, vec!["QueueWorker/produceMessage".to_string()]);
}

#[tokio::test]
async fn duplicate_forward_does_not_duplicate_pending() {
    // Dedup property at the router level.
    let mut fx = fixture();
    let http = fx.add_worker(WorkerKind::Http).await;
    let _db = fx.add_worker(WorkerKind::Database).await;

    let env = routed_envelope("m1", "DatabaseWorker/createNewData");
    fx.supervisor.on_worker_message(&http, env.clone()).await;
    fx.supervisor.on_worker_message(&http, env).await;

    assert_eq!(fx.supervisor.pending().len(WorkerKind::Database), 1);
}

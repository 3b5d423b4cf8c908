// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn standard_fleet_declares_every_kind_once() {
    let fleet = FleetDescriptor::standard();
    assert_eq!(fleet.workers.len(), WorkerKind::ALL.len());
    for kind in WorkerKind::ALL {
        let desc = fleet.get(kind).unwrap();
        assert_eq!(desc.count, 1);
    }
}

#[test]
fn database_defaults_mirror_the_reference_deployment() {
    let fleet = FleetDescriptor::standard();
    let config = fleet.config_for(WorkerKind::Database);
    assert_eq!(config["db_url"], "mongodb://localhost:27017");
    assert_eq!(config["db_name"], "projects");
    assert_eq!(config["collection_name"], "project");
}

#[test]
fn port_defaults() {
    let fleet = FleetDescriptor::standard();
    assert_eq!(fleet.config_for(WorkerKind::Http)["port"], "4000");
    assert_eq!(fleet.config_for(WorkerKind::GraphQl)["graphql_port"], "4001");
    assert_eq!(fleet.config_for(WorkerKind::Queue)["rabbitMqUrl"], "amqp://localhost:5672");
}

#[test]
fn config_for_undeclared_kind_falls_back_to_defaults() {
    let fleet = FleetDescriptor { workers: vec![WorkerDescriptor::new(WorkerKind::Database, 1)] };
    let config = fleet.config_for(WorkerKind::Queue);
    assert_eq!(config["produceQueue"], "project.crawl");
}

#[test]
fn with_overrides_a_single_entry() {
    let desc = WorkerDescriptor::new(WorkerKind::Http, 2).with("port", "8080");
    assert_eq!(desc.count, 2);
    assert_eq!(desc.config["port"], "8080");
    // untouched defaults remain
    assert!(desc.config.contains_key("jwt_secret"));
}

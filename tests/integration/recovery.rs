//! Restart recovery tests.
//!
//! These tests verify that a DAG survives being flattened to persisted
//! units and rebuilt, both in memory and through a JSON snapshot, and that
//! configuration survives a trip through a TOML file.

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;
use workdag::core::{NodeConfig, TaskUnitId, UuidIds};
use workdag::log::LogLevel;
use workdag::{Command, Config, Status, Storage, TaskUnit, WorkUnitDag};

use crate::fixtures::{definition, definitions, key_of, Kitchen};

fn edge_keys(dag: &WorkUnitDag) -> Vec<(TaskUnitId, TaskUnitId)> {
    let mut edges = Vec::new();
    for (vertex, node) in dag.units() {
        for descendant in dag.descendants_of(vertex).unwrap() {
            edges.push((node.key().clone(), key_of(dag, descendant)));
        }
    }
    edges.sort();
    edges
}

fn statuses(dag: &WorkUnitDag) -> HashMap<TaskUnitId, Status> {
    dag.units()
        .map(|(_, node)| (node.key().clone(), node.status()))
        .collect()
}

/// Test: Round trip
/// Given a diamond with progress recorded on two of its units
/// When it is materialized and rebuilt
/// Then vertices, statuses and edges are unchanged
#[test]
fn test_materialize_rebuild_round_trip() {
    let prep = definition("prep", "chef");
    let serve = definition("serve", "waiter");
    let mut dag = WorkUnitDag::default();
    let prep_factory = dag.deferred_vertex(&prep);
    let root = dag.spawn(&prep_factory).unwrap();
    let left = dag.extend(root, &prep_factory).unwrap();
    let right = dag.extend(root, &prep_factory).unwrap();
    let tail = dag
        .join(&[left, right], &dag.deferred_vertex(&serve))
        .unwrap();
    dag.set_status(root, Status::Success).unwrap();
    dag.set_status(left, Status::InProgress).unwrap();

    let rebuilt = WorkUnitDag::rebuild(
        Arc::new(UuidIds),
        dag.materialize().into_units(),
        &definitions(&[&prep, &serve]),
    )
    .unwrap();

    assert_eq!(rebuilt.unit_count(), 4);
    assert_eq!(rebuilt.edge_count(), 4);
    assert_eq!(statuses(&rebuilt), statuses(&dag));
    assert_eq!(edge_keys(&rebuilt), edge_keys(&dag));

    let tail_key = key_of(&dag, tail);
    let rebuilt_tail = rebuilt.find(&tail_key).unwrap();
    assert_eq!(rebuilt.node(rebuilt_tail).unwrap().definition, Some(serve));
    assert_eq!(
        rebuilt
            .available_units()
            .into_iter()
            .map(|v| key_of(&rebuilt, v))
            .collect::<Vec<_>>(),
        vec![key_of(&dag, right)]
    );
}

/// Test: Unit payload survives
/// Given a unit with data, an error and a command log
/// When it is materialized and rebuilt
/// Then the payload is carried over untouched
#[test]
fn test_unit_payload_survives_rebuild() {
    let prep = definition("prep", "chef");
    let mut dag = WorkUnitDag::default();
    let vertex = dag
        .add_unit(
            NodeConfig::default()
                .with_key(TaskUnitId::new("fixed"))
                .with_definition(prep.clone())
                .with_status(Status::Error)
                .with_error("oven down")
                .with_data("station", "grill")
                .with_commands(vec![Command::error("oven down")]),
        )
        .unwrap();

    let rebuilt = WorkUnitDag::rebuild(
        Arc::new(UuidIds),
        dag.materialize().into_units(),
        &definitions(&[&prep]),
    )
    .unwrap();
    let original = dag.node(vertex).unwrap();
    let restored = rebuilt
        .node(rebuilt.find(&TaskUnitId::new("fixed")).unwrap())
        .unwrap();
    assert_eq!(restored, original);
}

/// Test: Restart from a snapshot
/// Given a store where the chef finished cooking
/// When the task's units are written to JSON and read back into a new graph
/// Then the rebuilt graph schedules exactly what the store schedules
#[test]
fn test_restart_from_json_snapshot() {
    let kitchen = Kitchen::new();
    let mut dag = kitchen.dag();
    let cook = dag.spawn(&dag.deferred_vertex(&kitchen.cook)).unwrap();
    let plate = dag.extend(cook, &dag.deferred_vertex(&kitchen.plate)).unwrap();
    let serve = dag.extend(plate, &dag.deferred_vertex(&kitchen.serve)).unwrap();
    let (cook, plate, serve) = (key_of(&dag, cook), key_of(&dag, plate), key_of(&dag, serve));
    let task = kitchen.submit("order-1", &dag);
    kitchen
        .store
        .submit_command(&kitchen.chef, &cook, Command::success())
        .unwrap();

    let snapshot = serde_json::to_string(&kitchen.store.task_units(&task).unwrap()).unwrap();
    let units: Vec<TaskUnit> = serde_json::from_str(&snapshot).unwrap();
    let definitions = kitchen
        .store
        .task_definitions()
        .unwrap()
        .into_iter()
        .map(|definition| (definition.key.clone(), definition))
        .collect();

    let restored = WorkUnitDag::rebuild(Arc::new(UuidIds), units, &definitions).unwrap();
    assert_eq!(restored.validate().unwrap(), vec![cook, plate.clone(), serve]);

    let ready: Vec<_> = restored
        .available_units_for_owner(&kitchen.chef)
        .into_iter()
        .map(|v| key_of(&restored, v))
        .collect();
    assert_eq!(ready, vec![plate]);
    assert_eq!(ready, kitchen.ready(&kitchen.chef));
    assert!(restored.available_units_for_owner(&kitchen.waiter).is_empty());
}

/// Test: Commands keep working after a rebuild
/// Given a rebuilt graph with a finished dependency
/// When the dependent is moved through its lifecycle
/// Then the transitions are gated exactly as before the restart
#[test]
fn test_transitions_after_rebuild() {
    let a_def = definition("a", "ops");
    let b_def = definition("b", "ops");
    let mut dag = WorkUnitDag::default();
    let (a, b) = dag
        .connect_new(&dag.deferred_vertex(&a_def), &dag.deferred_vertex(&b_def))
        .unwrap();
    let (a_key, b_key) = (key_of(&dag, a), key_of(&dag, b));

    let mut rebuilt = WorkUnitDag::rebuild(
        Arc::new(UuidIds),
        dag.materialize().into_units(),
        &definitions(&[&a_def, &b_def]),
    )
    .unwrap();
    let a = rebuilt.find(&a_key).unwrap();
    let b = rebuilt.find(&b_key).unwrap();

    assert!(!rebuilt.can_change_status(b).unwrap());
    assert!(rebuilt.set_status(a, Status::Success).unwrap());
    assert!(rebuilt.can_change_status(b).unwrap());
    assert!(rebuilt.set_status(b, Status::Error).unwrap());
    assert!(!rebuilt.can_change_status(b).unwrap());
}

/// Test: Config file round trip
/// Given a config with a custom log level and inbox bounds
/// When it is saved into a fresh directory and loaded back
/// Then the loaded config equals the saved one
#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("workdag.toml");

    assert_eq!(Config::load(&path).unwrap(), Config::default());

    let mut config = Config::default();
    config.log.level = Some(LogLevel::Debug);
    config.inbox.max_page_size = 25;
    config.save(&path).unwrap();

    assert_eq!(Config::load(&path).unwrap(), config);
}

//! Randomized invariants over generated DAGs.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use workdag::core::{
    topological_sort, NodeConfig, SequentialIds, TaskUnitId, UuidIds, VertexRef,
};
use workdag::{Error, Status, TaskUnit, TaskUnitConfig, WorkUnitDag};

use crate::fixtures::{definition, definitions};

const MAX_UNITS: usize = 12;

// Acyclic by construction: unit i may only depend on units 0..i.
fn dependency_lists(max_units: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_units).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let mut deps: Vec<usize> = picks.into_iter().map(|p| p % i).collect();
                        deps.sort_unstable();
                        deps.dedup();
                        deps
                    })
                    .collect()
            },
        )
    })
}

fn status_lists() -> impl Strategy<Value = Vec<Status>> {
    proptest::collection::vec(proptest::sample::select(Status::ALL.to_vec()), MAX_UNITS)
}

fn key(i: usize) -> TaskUnitId {
    TaskUnitId::new(format!("u{}", i))
}

fn units(deps: &[Vec<usize>]) -> Vec<TaskUnit> {
    deps.iter()
        .enumerate()
        .map(|(i, on)| {
            TaskUnit::new(
                key(i),
                TaskUnitConfig::default().depends_on(on.iter().map(|&j| key(j))),
            )
        })
        .collect()
}

fn build(deps: &[Vec<usize>], statuses: &[Status]) -> (WorkUnitDag, Vec<VertexRef>) {
    let step = definition("step", "ops");
    let mut dag = WorkUnitDag::new(Arc::new(SequentialIds::new("p")));
    let mut vertices = Vec::with_capacity(deps.len());
    for i in 0..deps.len() {
        let vertex = dag
            .add_unit(
                NodeConfig::default()
                    .with_key(key(i))
                    .with_definition(step.clone())
                    .with_status(statuses[i]),
            )
            .unwrap();
        vertices.push(vertex);
    }
    for (i, on) in deps.iter().enumerate() {
        for &j in on {
            dag.connect(vertices[j], vertices[i]).unwrap();
        }
    }
    (dag, vertices)
}

proptest! {
    #[test]
    fn test_sort_is_edge_respecting_permutation(deps in dependency_lists(MAX_UNITS), reverse in any::<bool>()) {
        let mut input = units(&deps);
        if reverse {
            input.reverse();
        }
        let order = topological_sort(&input).unwrap();

        prop_assert_eq!(order.len(), deps.len());
        let position: HashMap<&TaskUnitId, usize> =
            order.iter().enumerate().map(|(p, id)| (id, p)).collect();
        prop_assert_eq!(position.len(), deps.len());
        for (i, on) in deps.iter().enumerate() {
            for &j in on {
                prop_assert!(position[&key(j)] < position[&key(i)]);
            }
        }
    }

    #[test]
    fn test_cycle_is_always_reported(deps in dependency_lists(MAX_UNITS)) {
        prop_assume!(deps.len() >= 2);
        let last = deps.len() - 1;
        let mut input = units(&deps);
        input[0].depends_on_ids.insert(key(last));
        input[last].depends_on_ids.insert(key(0));

        let result = topological_sort(&input);
        prop_assert!(
            matches!(result, Err(Error::CyclicDependency { .. })),
            "expected a CyclicDependency error"
        );
    }

    #[test]
    fn test_available_units_are_exactly_the_ready_ones(
        deps in dependency_lists(MAX_UNITS),
        statuses in status_lists(),
    ) {
        let (dag, vertices) = build(&deps, &statuses);
        let available = dag.available_units();

        for (i, &vertex) in vertices.iter().enumerate() {
            let ready = statuses[i] == Status::None
                && deps[i].iter().all(|&j| statuses[j] == Status::Success);
            prop_assert_eq!(available.contains(&vertex), ready);
        }
    }

    #[test]
    fn test_terminal_units_never_transition(
        deps in dependency_lists(MAX_UNITS),
        statuses in status_lists(),
    ) {
        let (dag, vertices) = build(&deps, &statuses);
        for (i, &vertex) in vertices.iter().enumerate() {
            if statuses[i].is_terminal() {
                prop_assert!(!dag.can_change_status(vertex).unwrap());
            }
        }
    }

    #[test]
    fn test_rebuild_restores_materialized_graph(
        deps in dependency_lists(MAX_UNITS),
        statuses in status_lists(),
    ) {
        let (dag, vertices) = build(&deps, &statuses);
        let step = definition("step", "ops");
        let rebuilt = WorkUnitDag::rebuild(
            Arc::new(UuidIds),
            dag.materialize().into_units(),
            &definitions(&[&step]),
        )
        .unwrap();

        prop_assert_eq!(rebuilt.unit_count(), dag.unit_count());
        prop_assert_eq!(rebuilt.edge_count(), dag.edge_count());
        for (i, on) in deps.iter().enumerate() {
            let vertex = rebuilt.find(&key(i)).unwrap();
            let restored = rebuilt.node(vertex).unwrap();
            let original = dag.node(vertices[i]).unwrap();
            prop_assert_eq!(restored.status(), original.status());
            prop_assert_eq!(&restored.definition, &original.definition);
            prop_assert_eq!(rebuilt.ancestors_of(vertex).unwrap().len(), on.len());
            for &j in on {
                let source = rebuilt.find(&key(j)).unwrap();
                prop_assert!(rebuilt.has_edge(source, vertex));
            }
        }
    }
}

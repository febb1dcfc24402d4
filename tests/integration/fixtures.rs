//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A seeded restaurant store (owners, definitions, topic, job)
//! - Submitting a built DAG as an assigned or draft task
//! - Reading an owner's ready units back out of the inbox

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use workdag::core::{
    JobId, OwnerId, SequentialIds, TaskDefinitionId, TaskId, TaskUnitId, TopicId, VertexRef,
};
use workdag::observe::MemorySink;
use workdag::{
    Job, JobConfig, MemoryStore, Owner, OwnerConfig, Page, Storage, Task, TaskDefinition,
    TaskDefinitionConfig, Topic, TopicConfig, WorkUnitDag,
};

/// A standalone definition, for tests that never touch a store.
pub fn definition(key: &str, owner: &str) -> TaskDefinition {
    TaskDefinition::new(
        TaskDefinitionId::new(key),
        key,
        OwnerId::new(owner),
        TaskDefinitionConfig::default(),
    )
}

pub fn definitions(list: &[&TaskDefinition]) -> HashMap<TaskDefinitionId, TaskDefinition> {
    list.iter()
        .map(|definition| (definition.key.clone(), (*definition).clone()))
        .collect()
}

/// Key of a vertex, panicking on a foreign handle.
pub fn key_of(dag: &WorkUnitDag, vertex: VertexRef) -> TaskUnitId {
    dag.node(vertex).expect("vertex belongs to dag").key().clone()
}

/// A store seeded with a chef and a waiter.
///
/// - `cook` and `plate` are owned by the chef
/// - `serve` is owned by the waiter
/// - job `table-7` is assigned to topic `dinner-service`
pub struct Kitchen {
    pub store: MemoryStore,
    pub sink: Arc<MemorySink>,
    pub units: Arc<SequentialIds>,
    pub chef: OwnerId,
    pub waiter: OwnerId,
    pub cook: TaskDefinition,
    pub plate: TaskDefinition,
    pub serve: TaskDefinition,
    pub topic: TopicId,
    pub job: JobId,
}

impl Kitchen {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let sink = Arc::new(MemorySink::new());
        let store = store
            .with_ids(Arc::new(SequentialIds::new("rec")))
            .with_sink(sink.clone());

        let chef = OwnerId::new("chef");
        let waiter = OwnerId::new("waiter");
        store
            .create_owner(Owner::new(
                chef.clone(),
                "Chef",
                OwnerConfig::default().with_description("runs the line"),
            ))
            .expect("create chef");
        store
            .create_owner(Owner::new(waiter.clone(), "Waiter", OwnerConfig::default()))
            .expect("create waiter");

        let cook = TaskDefinition::new(
            TaskDefinitionId::new("cook"),
            "cook",
            chef.clone(),
            TaskDefinitionConfig::default().with_description("fire the order"),
        );
        let plate = TaskDefinition::new(
            TaskDefinitionId::new("plate"),
            "plate",
            chef.clone(),
            TaskDefinitionConfig::default(),
        );
        let serve = TaskDefinition::new(
            TaskDefinitionId::new("serve"),
            "serve",
            waiter.clone(),
            TaskDefinitionConfig::default().with_identifier("svc"),
        );
        for definition in [&cook, &plate, &serve] {
            store
                .create_task_definition(definition.clone())
                .expect("create definition");
        }

        let topic = TopicId::new("dinner-service");
        let job = JobId::new("table-7");
        store
            .create_topic(Topic::new(
                topic.clone(),
                "Dinner service",
                TopicConfig::default(),
            ))
            .expect("create topic");
        store
            .create_job(Job::new(job.clone(), JobConfig::default().with_entry("covers", "4")))
            .expect("create job");
        store.assign_job(&topic, &job).expect("assign job");
        sink.take();

        Self {
            store,
            sink,
            units: Arc::new(SequentialIds::new("unit")),
            chef,
            waiter,
            cook,
            plate,
            serve,
            topic,
            job,
        }
    }

    /// An empty DAG minting unit keys unique across this kitchen.
    pub fn dag(&self) -> WorkUnitDag {
        WorkUnitDag::new(self.units.clone())
    }

    /// Persist `dag` as a task under `job`.
    pub fn submit_to(&self, job: &JobId, task: &str, dag: &WorkUnitDag) -> TaskId {
        let task_id = self.draft(task, dag);
        self.store.assign_task(job, &task_id).expect("assign task");
        task_id
    }

    /// Persist `dag` as a task under the kitchen's job.
    pub fn submit(&self, task: &str, dag: &WorkUnitDag) -> TaskId {
        self.submit_to(&self.job, task, dag)
    }

    /// Persist `dag` as a task that belongs to no job.
    pub fn draft(&self, task: &str, dag: &WorkUnitDag) -> TaskId {
        let task_id = TaskId::new(task);
        self.store
            .create_task(Task::new(task_id.clone()))
            .expect("create task");
        let ids = self
            .store
            .create_task_units(dag.materialize().into_units())
            .expect("create units");
        self.store
            .assign_task_units(&task_id, &ids)
            .expect("assign units");
        task_id
    }

    /// Ready units of `owner` across every task, in inbox order.
    pub fn ready(&self, owner: &OwnerId) -> Vec<TaskUnitId> {
        self.store
            .inbox(owner, Page::default())
            .expect("inbox")
            .entries
            .into_iter()
            .flat_map(|entry| entry.units)
            .map(|unit| unit.key)
            .collect()
    }
}

//! Reference in-memory backend.
//!
//! All maps sit behind a single `parking_lot::RwLock`: queries take the
//! read lock, mutations the write lock. Events are handed to the sink after
//! the lock is released.

use super::render::{render_tree, TreeView};
use super::Storage;
use crate::config::{Config, InboxConfig};
use crate::core::dag::WorkUnitDag;
use crate::core::definition::{Owner, TaskDefinition, TaskDefinitionUpdate};
use crate::core::hierarchy::{Job, Task, Topic, TopicCounters};
use crate::core::ids::{
    IdSource, JobId, OwnerId, TaskDefinitionId, TaskId, TaskUnitId, TopicId, UuidIds,
};
use crate::core::inbox::{collect_inbox, InboxPage, InboxView, Page};
use crate::core::status::{Command, Status};
use crate::core::topo::topological_sort;
use crate::core::unit::{TaskUnit, UnitEdit};
use crate::error::{EntityKind, Error, Result};
use crate::observe::{EventSink, StoreEvent, StoreEventKind, TracingSink};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    owners: HashMap<OwnerId, Owner>,
    definitions: HashMap<TaskDefinitionId, TaskDefinition>,
    topics: HashMap<TopicId, Topic>,
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<TaskId, Task>,
    units: HashMap<TaskUnitId, TaskUnit>,
}

impl Inner {
    fn owner_name_taken(&self, name: &str, except: Option<&OwnerId>) -> bool {
        self.owners
            .values()
            .any(|owner| owner.name == name && Some(&owner.key) != except)
    }

    fn definition_name_taken(&self, name: &str, except: Option<&TaskDefinitionId>) -> bool {
        self.definitions
            .values()
            .any(|definition| definition.name == name && Some(&definition.key) != except)
    }

    fn topic_name_taken(&self, name: &str, except: Option<&TopicId>) -> bool {
        self.topics
            .values()
            .any(|topic| topic.name == name && Some(&topic.key) != except)
    }

    fn units_of(&self, task: &Task) -> Result<Vec<TaskUnit>> {
        task.task_unit_ids
            .iter()
            .map(|id| {
                self.units
                    .get(id)
                    .cloned()
                    .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))
            })
            .collect()
    }

    fn assembled_task(&self, id: &TaskId) -> Result<Task> {
        let mut task = self
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Task, id))?;
        task.task_units = self
            .units_of(&task)?
            .into_iter()
            .map(|unit| (unit.key.clone(), unit))
            .collect();
        Ok(task)
    }

    fn assembled_job(&self, id: &JobId) -> Result<Job> {
        let mut job = self
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Job, id))?;
        for task_id in &job.task_ids {
            let task = self.assembled_task(task_id)?;
            job.tasks.insert(task_id.clone(), task);
        }
        Ok(job)
    }

    fn assembled_topic(&self, id: &TopicId) -> Result<Topic> {
        let mut topic = self
            .topics
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Topic, id))?;
        for job_id in &topic.job_ids {
            let job = self.assembled_job(job_id)?;
            topic.jobs.insert(job_id.clone(), job);
        }
        let counters: TopicCounters = topic
            .jobs
            .values()
            .flat_map(|job| job.tasks.values())
            .flat_map(|task| task.task_units.values())
            .map(|unit| unit.status)
            .collect();
        topic.counters = Some(counters);
        Ok(topic)
    }

    fn cancel_units(&mut self, ids: &[TaskUnitId], reason: &str) -> usize {
        let mut canceled = 0;
        for id in ids {
            if let Some(unit) = self.units.get_mut(id) {
                if matches!(unit.status, Status::Queued | Status::InProgress) {
                    unit.apply([
                        UnitEdit::Status(Status::Error),
                        UnitEdit::Error(Some(reason.to_string())),
                    ]);
                    canceled += 1;
                }
            }
        }
        canceled
    }
}

/// In-memory [`Storage`] backend.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    ids: Arc<dyn IdSource>,
    sink: Arc<dyn EventSink>,
    inbox: InboxConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ids: Arc::new(UuidIds),
            sink: Arc::new(TracingSink),
            inbox: InboxConfig::default(),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.inbox = config.inbox.clone();
        self
    }

    fn emit(&self, kind: StoreEventKind) {
        self.sink.record(&StoreEvent::now(kind));
    }

    /// Topic → Job → Task → units, units in dependency order and indented
    /// by depth.
    pub fn render_tree(&self) -> String {
        let inner = self.inner.read();
        render_tree(TreeView {
            owners: &inner.owners,
            definitions: &inner.definitions,
            topics: &inner.topics,
            jobs: &inner.jobs,
            tasks: &inner.tasks,
            units: &inner.units,
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("owners", &inner.owners.len())
            .field("definitions", &inner.definitions.len())
            .field("topics", &inner.topics.len())
            .field("jobs", &inner.jobs.len())
            .field("tasks", &inner.tasks.len())
            .field("units", &inner.units.len())
            .field("sink", &self.sink.name())
            .finish()
    }
}

impl IdSource for MemoryStore {
    fn new_id(&self) -> Result<String> {
        self.ids.new_id()
    }
}

fn created(kind: EntityKind, key: impl ToString) -> StoreEventKind {
    StoreEventKind::Created {
        kind,
        key: key.to_string(),
    }
}

impl Storage for MemoryStore {
    fn create_owner(&self, owner: Owner) -> Result<()> {
        let key = owner.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.owners.contains_key(&key) {
                return Err(Error::duplicate_id(EntityKind::Owner, &key));
            }
            if inner.owner_name_taken(&owner.name, None) {
                return Err(Error::duplicate_name(EntityKind::Owner, &owner.name));
            }
            inner.owners.insert(key.clone(), owner);
        }
        self.emit(created(EntityKind::Owner, key));
        Ok(())
    }

    fn create_task_definition(&self, definition: TaskDefinition) -> Result<()> {
        let key = definition.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.definitions.contains_key(&key) {
                return Err(Error::duplicate_id(EntityKind::TaskDefinition, &key));
            }
            if inner.definition_name_taken(&definition.name, None) {
                return Err(Error::duplicate_name(
                    EntityKind::TaskDefinition,
                    &definition.name,
                ));
            }
            if !inner.owners.contains_key(&definition.owner_id) {
                return Err(Error::not_found(EntityKind::Owner, &definition.owner_id));
            }
            inner.definitions.insert(key.clone(), definition);
        }
        self.emit(created(EntityKind::TaskDefinition, key));
        Ok(())
    }

    fn create_topic(&self, mut topic: Topic) -> Result<()> {
        let key = topic.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.topics.contains_key(&key) {
                return Err(Error::duplicate_id(EntityKind::Topic, &key));
            }
            if inner.topic_name_taken(&topic.name, None) {
                return Err(Error::duplicate_name(EntityKind::Topic, &topic.name));
            }
            topic.job_ids.clear();
            topic.jobs.clear();
            topic.counters = None;
            inner.topics.insert(key.clone(), topic);
        }
        self.emit(created(EntityKind::Topic, key));
        Ok(())
    }

    fn create_job(&self, mut job: Job) -> Result<()> {
        let key = job.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.jobs.contains_key(&key) {
                return Err(Error::duplicate_id(EntityKind::Job, &key));
            }
            job.topic_id = None;
            job.task_ids.clear();
            job.tasks.clear();
            inner.jobs.insert(key.clone(), job);
        }
        self.emit(created(EntityKind::Job, key));
        Ok(())
    }

    fn create_task(&self, mut task: Task) -> Result<()> {
        let key = task.key.clone();
        {
            let mut inner = self.inner.write();
            if inner.tasks.contains_key(&key) {
                return Err(Error::duplicate_id(EntityKind::Task, &key));
            }
            task.job_id = None;
            task.task_unit_ids.clear();
            task.task_units.clear();
            inner.tasks.insert(key.clone(), task);
        }
        self.emit(created(EntityKind::Task, key));
        Ok(())
    }

    fn create_task_units(&self, units: Vec<TaskUnit>) -> Result<Vec<TaskUnitId>> {
        let keys: Vec<TaskUnitId> = units.iter().map(|unit| unit.key.clone()).collect();
        {
            let mut inner = self.inner.write();
            let mut batch = HashSet::with_capacity(units.len());
            for unit in &units {
                if inner.units.contains_key(&unit.key) || !batch.insert(&unit.key) {
                    return Err(Error::duplicate_id(EntityKind::TaskUnit, &unit.key));
                }
                if let Some(definition) = &unit.definition_id {
                    if !inner.definitions.contains_key(definition) {
                        return Err(Error::not_found(EntityKind::TaskDefinition, definition));
                    }
                }
            }
            for unit in &units {
                for dependency in &unit.depends_on_ids {
                    if !batch.contains(dependency) && !inner.units.contains_key(dependency) {
                        return Err(Error::not_found(EntityKind::TaskUnit, dependency));
                    }
                }
            }
            for mut unit in units {
                unit.task_id = None;
                inner.units.insert(unit.key.clone(), unit);
            }
        }
        for key in &keys {
            self.emit(created(EntityKind::TaskUnit, key));
        }
        Ok(keys)
    }

    fn assign_job(&self, topic: &TopicId, job: &JobId) -> Result<()> {
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let topic_record = inner
                .topics
                .get_mut(topic)
                .ok_or_else(|| Error::not_found(EntityKind::Topic, topic))?;
            let job_record = inner
                .jobs
                .get_mut(job)
                .ok_or_else(|| Error::not_found(EntityKind::Job, job))?;
            if job_record.topic_id.is_some() {
                return Err(Error::already_assigned(EntityKind::Job, job));
            }
            job_record.topic_id = Some(topic.clone());
            topic_record.job_ids.push(job.clone());
        }
        self.emit(StoreEventKind::Assigned {
            kind: EntityKind::Job,
            key: job.to_string(),
            parent: topic.to_string(),
        });
        Ok(())
    }

    fn assign_task(&self, job: &JobId, task: &TaskId) -> Result<()> {
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let job_record = inner
                .jobs
                .get_mut(job)
                .ok_or_else(|| Error::not_found(EntityKind::Job, job))?;
            let task_record = inner
                .tasks
                .get_mut(task)
                .ok_or_else(|| Error::not_found(EntityKind::Task, task))?;
            if task_record.job_id.is_some() {
                return Err(Error::already_assigned(EntityKind::Task, task));
            }
            task_record.job_id = Some(job.clone());
            job_record.task_ids.push(task.clone());
        }
        self.emit(StoreEventKind::Assigned {
            kind: EntityKind::Task,
            key: task.to_string(),
            parent: job.to_string(),
        });
        Ok(())
    }

    fn assign_task_units(&self, task: &TaskId, units: &[TaskUnitId]) -> Result<()> {
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let task_record = inner
                .tasks
                .get_mut(task)
                .ok_or_else(|| Error::not_found(EntityKind::Task, task))?;

            let mut seen = HashSet::with_capacity(units.len());
            for id in units {
                let unit = inner
                    .units
                    .get(id)
                    .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;
                if unit.task_id.is_some() || !seen.insert(id) {
                    return Err(Error::already_assigned(EntityKind::TaskUnit, id));
                }
            }

            // The task must still be one closed DAG once the batch joins it.
            let members: HashSet<&TaskUnitId> =
                task_record.task_unit_ids.iter().chain(units).collect();
            let resulting: Vec<&TaskUnit> = members
                .iter()
                .filter_map(|id| inner.units.get(*id))
                .collect();
            for unit in &resulting {
                if let Some(outside) = unit
                    .depends_on_ids
                    .iter()
                    .find(|dependency| !members.contains(dependency))
                {
                    tracing::debug!(
                        task = %task,
                        unit = %unit.key,
                        dependency = %outside,
                        "dependency outside the task"
                    );
                    return Err(Error::not_found(EntityKind::TaskUnit, outside));
                }
            }
            topological_sort(resulting).inspect_err(|error| {
                tracing::debug!(task = %task, %error, "assignment would break the task DAG");
            })?;

            for id in units {
                if let Some(unit) = inner.units.get_mut(id) {
                    unit.apply([UnitEdit::Task(task.clone())]);
                }
                task_record.push_unit(id.clone());
            }
        }
        for id in units {
            self.emit(StoreEventKind::Assigned {
                kind: EntityKind::TaskUnit,
                key: id.to_string(),
                parent: task.to_string(),
            });
        }
        Ok(())
    }

    fn owner(&self, id: &OwnerId) -> Result<Owner> {
        self.inner
            .read()
            .owners
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Owner, id))
    }

    fn owners(&self) -> Result<Vec<Owner>> {
        let mut owners: Vec<Owner> = self.inner.read().owners.values().cloned().collect();
        owners.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(owners)
    }

    fn task_definition(&self, id: &TaskDefinitionId) -> Result<TaskDefinition> {
        self.inner
            .read()
            .definitions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::TaskDefinition, id))
    }

    fn task_definitions(&self) -> Result<Vec<TaskDefinition>> {
        let mut definitions: Vec<TaskDefinition> =
            self.inner.read().definitions.values().cloned().collect();
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(definitions)
    }

    fn topic(&self, id: &TopicId) -> Result<Topic> {
        self.inner.read().assembled_topic(id)
    }

    fn topics(&self) -> Result<Vec<Topic>> {
        let inner = self.inner.read();
        let mut keys: Vec<&TopicId> = inner.topics.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| inner.assembled_topic(key))
            .collect()
    }

    fn job(&self, id: &JobId) -> Result<Job> {
        self.inner.read().assembled_job(id)
    }

    fn jobs(&self, topic: &TopicId) -> Result<Vec<Job>> {
        let inner = self.inner.read();
        let topic = inner
            .topics
            .get(topic)
            .ok_or_else(|| Error::not_found(EntityKind::Topic, topic))?;
        topic
            .job_ids
            .iter()
            .map(|id| inner.assembled_job(id))
            .collect()
    }

    fn task(&self, id: &TaskId) -> Result<Task> {
        self.inner.read().assembled_task(id)
    }

    fn tasks(&self, job: &JobId) -> Result<Vec<Task>> {
        let inner = self.inner.read();
        let job = inner
            .jobs
            .get(job)
            .ok_or_else(|| Error::not_found(EntityKind::Job, job))?;
        job.task_ids
            .iter()
            .map(|id| inner.assembled_task(id))
            .collect()
    }

    fn task_unit(&self, id: &TaskUnitId) -> Result<TaskUnit> {
        self.inner
            .read()
            .units
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))
    }

    fn task_units(&self, task: &TaskId) -> Result<Vec<TaskUnit>> {
        let inner = self.inner.read();
        let task = inner
            .tasks
            .get(task)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task))?;
        inner.units_of(task)
    }

    fn has_owner(&self, id: &OwnerId) -> bool {
        self.inner.read().owners.contains_key(id)
    }

    fn has_task_definition(&self, id: &TaskDefinitionId) -> bool {
        self.inner.read().definitions.contains_key(id)
    }

    fn has_topic(&self, id: &TopicId) -> bool {
        self.inner.read().topics.contains_key(id)
    }

    fn has_job(&self, id: &JobId) -> bool {
        self.inner.read().jobs.contains_key(id)
    }

    fn has_task(&self, id: &TaskId) -> bool {
        self.inner.read().tasks.contains_key(id)
    }

    fn has_task_unit(&self, id: &TaskUnitId) -> bool {
        self.inner.read().units.contains_key(id)
    }

    fn update_owner(&self, id: &OwnerId, name: &str) -> Result<Owner> {
        let owner = {
            let mut inner = self.inner.write();
            if inner.owner_name_taken(name, Some(id)) {
                return Err(Error::duplicate_name(EntityKind::Owner, name));
            }
            let owner = inner
                .owners
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Owner, id))?;
            owner.rename(name);
            owner.clone()
        };
        self.emit(StoreEventKind::Updated {
            kind: EntityKind::Owner,
            key: id.to_string(),
        });
        Ok(owner)
    }

    fn update_task_definition(
        &self,
        owner: &OwnerId,
        id: &TaskDefinitionId,
        update: TaskDefinitionUpdate,
    ) -> Result<TaskDefinition> {
        let definition = {
            let mut inner = self.inner.write();
            let current = inner
                .definitions
                .get(id)
                .ok_or_else(|| Error::not_found(EntityKind::TaskDefinition, id))?;
            if !current.is_owned_by(owner) {
                return Err(Error::InvalidOwner {
                    owner: owner.clone(),
                    key: id.to_string(),
                });
            }
            if let Some(name) = &update.name {
                if inner.definition_name_taken(name, Some(id)) {
                    return Err(Error::duplicate_name(EntityKind::TaskDefinition, name));
                }
            }
            let definition = inner
                .definitions
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::TaskDefinition, id))?;
            definition.update(update);
            definition.clone()
        };
        self.emit(StoreEventKind::Updated {
            kind: EntityKind::TaskDefinition,
            key: id.to_string(),
        });
        Ok(definition)
    }

    fn update_topic(&self, id: &TopicId, name: &str) -> Result<Topic> {
        let topic = {
            let mut inner = self.inner.write();
            if inner.topic_name_taken(name, Some(id)) {
                return Err(Error::duplicate_name(EntityKind::Topic, name));
            }
            let topic = inner
                .topics
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Topic, id))?;
            topic.name = name.to_string();
            topic.clone()
        };
        self.emit(StoreEventKind::Updated {
            kind: EntityKind::Topic,
            key: id.to_string(),
        });
        Ok(topic)
    }

    fn update_job_status(&self, id: &JobId, status: Status) -> Result<()> {
        let from = {
            let mut inner = self.inner.write();
            let job = inner
                .jobs
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Job, id))?;
            std::mem::replace(&mut job.status, status)
        };
        self.emit(StoreEventKind::StatusChanged {
            kind: EntityKind::Job,
            key: id.to_string(),
            from,
            to: status,
        });
        Ok(())
    }

    fn update_task_status(&self, id: &TaskId, status: Status) -> Result<()> {
        let from = {
            let mut inner = self.inner.write();
            let task = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Task, id))?;
            std::mem::replace(&mut task.status, status)
        };
        self.emit(StoreEventKind::StatusChanged {
            kind: EntityKind::Task,
            key: id.to_string(),
            from,
            to: status,
        });
        Ok(())
    }

    fn update_task_unit_status(
        &self,
        id: &TaskUnitId,
        status: Status,
        error: Option<String>,
    ) -> Result<()> {
        let from = {
            let mut inner = self.inner.write();
            let unit = inner
                .units
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;
            let from = unit.status;
            let error = if status == Status::Error { error } else { None };
            unit.apply([UnitEdit::Status(status), UnitEdit::Error(error)]);
            from
        };
        self.emit(StoreEventKind::StatusChanged {
            kind: EntityKind::TaskUnit,
            key: id.to_string(),
            from,
            to: status,
        });
        Ok(())
    }

    fn deprecate_owner(&self, id: &OwnerId) -> Result<Owner> {
        let owner = {
            let mut inner = self.inner.write();
            if !inner.owners.contains_key(id) {
                return Err(Error::not_found(EntityKind::Owner, id));
            }
            if inner.definitions.values().any(|d| d.is_owned_by(id)) {
                return Err(Error::InUse {
                    kind: EntityKind::Owner,
                    key: id.to_string(),
                });
            }
            inner
                .owners
                .remove(id)
                .ok_or_else(|| Error::not_found(EntityKind::Owner, id))?
        };
        self.emit(StoreEventKind::Deprecated {
            kind: EntityKind::Owner,
            key: id.to_string(),
        });
        Ok(owner)
    }

    fn deprecate_task_definition(&self, id: &TaskDefinitionId) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if !inner.definitions.contains_key(id) {
                return Err(Error::not_found(EntityKind::TaskDefinition, id));
            }
            if inner
                .units
                .values()
                .any(|unit| unit.definition_id.as_ref() == Some(id))
            {
                return Err(Error::InUse {
                    kind: EntityKind::TaskDefinition,
                    key: id.to_string(),
                });
            }
            inner.definitions.remove(id);
        }
        self.emit(StoreEventKind::Deprecated {
            kind: EntityKind::TaskDefinition,
            key: id.to_string(),
        });
        Ok(())
    }

    fn deprecate_topic(&self, id: &TopicId) -> Result<()> {
        {
            let mut inner = self.inner.write();
            let topic = inner
                .topics
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Topic, id))?;
            topic.deprecated = true;
        }
        self.emit(StoreEventKind::Deprecated {
            kind: EntityKind::Topic,
            key: id.to_string(),
        });
        Ok(())
    }

    fn cancel_job(&self, id: &JobId) -> Result<usize> {
        let (from, canceled) = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let job = inner
                .jobs
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Job, id))?;
            let from = std::mem::replace(&mut job.status, Status::Error);
            let unit_ids: Vec<TaskUnitId> = job
                .task_ids
                .iter()
                .filter_map(|task_id| inner.tasks.get(task_id))
                .flat_map(|task| task.task_unit_ids.iter().cloned())
                .collect();
            (from, inner.cancel_units(&unit_ids, "job canceled"))
        };
        self.emit(StoreEventKind::StatusChanged {
            kind: EntityKind::Job,
            key: id.to_string(),
            from,
            to: Status::Error,
        });
        self.emit(StoreEventKind::Canceled {
            kind: EntityKind::Job,
            key: id.to_string(),
            units: canceled,
        });
        Ok(canceled)
    }

    fn cancel_task(&self, id: &TaskId) -> Result<usize> {
        let (from, canceled) = {
            let mut inner = self.inner.write();
            let task = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| Error::not_found(EntityKind::Task, id))?;
            let from = std::mem::replace(&mut task.status, Status::Error);
            let unit_ids = task.task_unit_ids.clone();
            (from, inner.cancel_units(&unit_ids, "task canceled"))
        };
        self.emit(StoreEventKind::StatusChanged {
            kind: EntityKind::Task,
            key: id.to_string(),
            from,
            to: Status::Error,
        });
        self.emit(StoreEventKind::Canceled {
            kind: EntityKind::Task,
            key: id.to_string(),
            units: canceled,
        });
        Ok(canceled)
    }

    fn submit_command(&self, owner: &OwnerId, id: &TaskUnitId, command: Command) -> Result<bool> {
        let kind = command.kind;
        let mut events = Vec::new();
        let accepted = {
            let mut inner = self.inner.write();
            let unit = inner
                .units
                .get(id)
                .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;
            let owned = unit
                .definition_id
                .as_ref()
                .and_then(|definition| inner.definitions.get(definition))
                .is_some_and(|definition| definition.is_owned_by(owner));
            if !owned {
                return Err(Error::InvalidOwner {
                    owner: owner.clone(),
                    key: id.to_string(),
                });
            }
            let task_id = unit.task_id.clone().ok_or_else(|| Error::Unassigned {
                kind: EntityKind::TaskUnit,
                key: id.to_string(),
            })?;

            let accepted = match command.target_status() {
                None => true,
                Some(status) => {
                    let task = inner
                        .tasks
                        .get(&task_id)
                        .ok_or_else(|| Error::not_found(EntityKind::Task, &task_id))?;
                    let mut dag = WorkUnitDag::rebuild(
                        self.ids.clone(),
                        inner.units_of(task)?,
                        &inner.definitions,
                    )?;
                    let vertex = dag
                        .find(id)
                        .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;
                    let from = dag.node(vertex)?.status();
                    let accepted = dag.set_status_as(vertex, owner, status)?;
                    if accepted {
                        events.push(StoreEventKind::StatusChanged {
                            kind: EntityKind::TaskUnit,
                            key: id.to_string(),
                            from,
                            to: status,
                        });
                    }
                    accepted
                }
            };

            if accepted {
                let unit = inner
                    .units
                    .get_mut(id)
                    .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;
                let mut edits = Vec::with_capacity(3);
                if let Some(status) = command.target_status() {
                    edits.push(UnitEdit::Status(status));
                    edits.push(UnitEdit::Error(command.error_payload()));
                }
                edits.push(UnitEdit::Command(command));
                unit.apply(edits);
            } else {
                tracing::debug!(unit = %id, command = ?kind, "command refused by ancestor gating");
            }
            accepted
        };

        events.push(StoreEventKind::CommandApplied {
            unit: id.clone(),
            owner: owner.clone(),
            command: kind,
            accepted,
        });
        for event in events {
            self.emit(event);
        }
        Ok(accepted)
    }

    fn inbox(&self, owner: &OwnerId, page: Page) -> Result<InboxPage> {
        let page = page.bounded(self.inbox.default_page_size, self.inbox.max_page_size);
        let result = {
            let inner = self.inner.read();
            let view = InboxView {
                tasks: &inner.tasks,
                jobs: &inner.jobs,
                units: &inner.units,
                definitions: &inner.definitions,
            };
            collect_inbox(owner, view, self.ids.clone(), page)?
        };
        self.emit(StoreEventKind::InboxServed {
            owner: owner.clone(),
            entries: result.entries.len(),
        });
        Ok(result)
    }
}

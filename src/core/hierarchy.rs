//! Topic → Job → Task containers.
//!
//! The child collections (`jobs`, `tasks`, `task_units`) are assembled by a
//! storage backend on read-back and never serialized. The persisted link is
//! always the id list plus the child's parent id.

use crate::core::ids::{JobId, TaskId, TaskUnitId, TopicId};
use crate::core::status::Status;
use crate::core::unit::TaskUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One DAG instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub key: TaskId,
    /// `None` while the task is a draft.
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub task_unit_ids: Vec<TaskUnitId>,
    #[serde(skip)]
    pub task_units: HashMap<TaskUnitId, TaskUnit>,
}

impl Task {
    pub fn new(key: TaskId) -> Self {
        Self {
            key,
            job_id: None,
            status: Status::None,
            task_unit_ids: Vec::new(),
            task_units: HashMap::new(),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.job_id.is_none()
    }

    /// Record a unit id, ignoring repeats so the order stays insertion order.
    pub fn push_unit(&mut self, id: TaskUnitId) {
        if !self.task_unit_ids.contains(&id) {
            self.task_unit_ids.push(id);
        }
    }
}

/// Optional fields applied on top of a new [`Job`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfig {
    pub data: Option<BTreeMap<String, String>>,
}

impl JobConfig {
    pub fn with_data(mut self, data: BTreeMap<String, String>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A group of tasks inside a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub key: JobId,
    #[serde(default)]
    pub task_ids: Vec<TaskId>,
    #[serde(skip)]
    pub tasks: HashMap<TaskId, Task>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// `None` while the job is a draft.
    #[serde(default)]
    pub topic_id: Option<TopicId>,
}

impl Job {
    pub fn new(key: JobId, config: JobConfig) -> Self {
        let mut job = Self {
            key,
            task_ids: Vec::new(),
            tasks: HashMap::new(),
            status: Status::None,
            data: BTreeMap::new(),
            topic_id: None,
        };
        if let Some(data) = config.data {
            job.data = data;
        }
        job
    }

    pub fn is_draft(&self) -> bool {
        self.topic_id.is_none()
    }
}

/// Optional fields applied on top of a new [`Topic`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicConfig {
    pub description: Option<String>,
}

impl TopicConfig {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Unit status totals across every assigned task of a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCounters {
    pub completed: usize,
    /// none, queued and in-progress units.
    pub pending: usize,
    pub error: usize,
    pub pause: usize,
}

impl TopicCounters {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Success => self.completed += 1,
            Status::Error => self.error += 1,
            Status::Pause => self.pause += 1,
            Status::None | Status::Queued | Status::InProgress => self.pending += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.pending + self.error + self.pause
    }
}

impl FromIterator<Status> for TopicCounters {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut counters = TopicCounters::default();
        for status in iter {
            counters.record(status);
        }
        counters
    }
}

/// Top of the hierarchy, e.g. a project or a region rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub key: TopicId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub job_ids: Vec<JobId>,
    #[serde(skip)]
    pub jobs: HashMap<JobId, Job>,
    #[serde(skip)]
    pub counters: Option<TopicCounters>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Topic {
    pub fn new(key: TopicId, name: impl Into<String>, config: TopicConfig) -> Self {
        let mut topic = Self {
            key,
            name: name.into(),
            description: String::new(),
            job_ids: Vec::new(),
            jobs: HashMap::new(),
            counters: None,
            deprecated: false,
        };
        if let Some(description) = config.description {
            topic.description = description;
        }
        topic
    }
}

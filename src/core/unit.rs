//! The task unit record, a single vertex of a task's dependency graph.

use crate::core::ids::{TaskDefinitionId, TaskId, TaskUnitId};
use crate::core::status::{Command, Status};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Optional fields applied on top of a new [`TaskUnit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUnitConfig {
    pub definition_id: Option<TaskDefinitionId>,
    pub task_id: Option<TaskId>,
    pub status: Option<Status>,
    pub data: Option<BTreeMap<String, String>>,
    pub depends_on: Vec<TaskUnitId>,
}

impl TaskUnitConfig {
    pub fn with_definition(mut self, definition_id: TaskDefinitionId) -> Self {
        self.definition_id = Some(definition_id);
        self
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: BTreeMap<String, String>) -> Self {
        self.data = Some(data);
        self
    }

    /// Adds dependencies; repeated calls accumulate.
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = TaskUnitId>) -> Self {
        self.depends_on.extend(ids);
        self
    }
}

/// One in-place change to a [`TaskUnit`], see [`TaskUnit::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEdit {
    Status(Status),
    Error(Option<String>),
    Task(TaskId),
    Data(BTreeMap<String, String>),
    DependsOn(TaskUnitId),
    Command(Command),
}

/// Granular work unit inside a task's DAG.
///
/// `depends_on_ids` is the persisted form of the unit's incoming edges. The
/// units themselves are resolved on demand through
/// [`crate::core::dag::UnitIndex`], never stored as back-references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    pub key: TaskUnitId,
    pub definition_id: Option<TaskDefinitionId>,
    #[serde(default)]
    pub depends_on_ids: BTreeSet<TaskUnitId>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub error: Option<String>,
    /// `None` while the unit is a draft.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl TaskUnit {
    pub fn new(key: TaskUnitId, config: TaskUnitConfig) -> Self {
        let mut unit = Self {
            key,
            definition_id: None,
            depends_on_ids: BTreeSet::new(),
            commands: Vec::new(),
            status: Status::None,
            error: None,
            task_id: None,
            data: BTreeMap::new(),
        };
        unit.definition_id = config.definition_id;
        unit.task_id = config.task_id;
        if let Some(status) = config.status {
            unit.status = status;
        }
        if let Some(data) = config.data {
            unit.data = data;
        }
        unit.depends_on_ids.extend(config.depends_on);
        unit
    }

    /// Apply edits in order. Edits cannot fail, so a batch never stops halfway.
    pub fn apply(&mut self, edits: impl IntoIterator<Item = UnitEdit>) {
        for edit in edits {
            match edit {
                UnitEdit::Status(status) => self.status = status,
                UnitEdit::Error(error) => self.error = error,
                UnitEdit::Task(task_id) => self.task_id = Some(task_id),
                UnitEdit::Data(data) => self.data.extend(data),
                UnitEdit::DependsOn(id) => {
                    self.depends_on_ids.insert(id);
                }
                UnitEdit::Command(command) => self.commands.push(command),
            }
        }
    }

    pub fn is_draft(&self) -> bool {
        self.task_id.is_none()
    }

    pub fn depends_on(&self, id: &TaskUnitId) -> bool {
        self.depends_on_ids.contains(id)
    }
}

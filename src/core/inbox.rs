//! Owner-scoped readiness across every known task.

use crate::core::dag::WorkUnitDag;
use crate::core::definition::TaskDefinition;
use crate::core::hierarchy::{Job, Task};
use crate::core::ids::{IdSource, JobId, OwnerId, TaskDefinitionId, TaskId, TaskUnitId, TopicId};
use crate::core::unit::TaskUnit;
use crate::error::{EntityKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Offset/size window over inbox entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub size: usize,
}

impl Page {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    pub fn first(size: usize) -> Self {
        Self::new(0, size)
    }

    /// Clamp `size` to `1..=max`, substituting `default` for zero.
    pub fn bounded(self, default: usize, max: usize) -> Self {
        let size = if self.size == 0 { default } else { self.size };
        Self {
            offset: self.offset,
            size: size.clamp(1, max.max(1)),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(usize::MAX)
    }
}

/// Ready units of one task that a single owner can work on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEntry {
    /// `None` while the job is still a draft.
    pub topic_id: Option<TopicId>,
    pub job_id: JobId,
    pub task_id: TaskId,
    pub units: Vec<TaskUnit>,
}

/// One page of an owner's inbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxPage {
    /// Entries before pagination.
    pub total: usize,
    pub entries: Vec<InboxEntry>,
}

/// Borrowed view over the records the inbox is computed from.
#[derive(Debug, Clone, Copy)]
pub struct InboxView<'a> {
    pub tasks: &'a HashMap<TaskId, Task>,
    pub jobs: &'a HashMap<JobId, Job>,
    pub units: &'a HashMap<TaskUnitId, TaskUnit>,
    pub definitions: &'a HashMap<TaskDefinitionId, TaskDefinition>,
}

impl<'a> InboxView<'a> {
    fn task_units(&self, task: &Task) -> Result<Vec<TaskUnit>> {
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
}

/// Collect every ready unit `owner` is responsible for, grouped by task.
///
/// Any inconsistency (a draft task holding the owner's units, a dangling
/// job, a cycle) fails the whole call.
pub fn collect_inbox(
    owner: &OwnerId,
    view: InboxView<'_>,
    ids: Arc<dyn IdSource>,
    page: Page,
) -> Result<InboxPage> {
    let owned: HashSet<&TaskDefinitionId> = view
        .definitions
        .values()
        .filter(|definition| definition.is_owned_by(owner))
        .map(|definition| &definition.key)
        .collect();

    let mut candidates: Vec<&Task> = view
        .tasks
        .values()
        .filter(|task| {
            task.task_unit_ids.iter().any(|id| {
                view.units
                    .get(id)
                    .and_then(|unit| unit.definition_id.as_ref())
                    .is_some_and(|definition| owned.contains(definition))
            })
        })
        .collect();
    candidates.sort_by(|a, b| a.key.cmp(&b.key));

    let mut entries = Vec::new();
    for task in candidates {
        let job_id = task
            .job_id
            .as_ref()
            .ok_or_else(|| Error::OrphanTask(task.key.clone()))?;
        let job = view
            .jobs
            .get(job_id)
            .ok_or_else(|| Error::not_found(EntityKind::Job, job_id))?;

        let dag = WorkUnitDag::rebuild(ids.clone(), view.task_units(task)?, view.definitions)?;
        dag.validate()?;

        let units = dag
            .available_units_for_owner(owner)
            .into_iter()
            .map(|vertex| dag.node(vertex).map(|node| node.unit.clone()))
            .collect::<Result<Vec<_>>>()?;
        if units.is_empty() {
            continue;
        }

        entries.push(InboxEntry {
            topic_id: job.topic_id.clone(),
            job_id: job_id.clone(),
            task_id: task.key.clone(),
            units,
        });
    }

    entries.sort_by(|a, b| {
        (&a.topic_id, &a.job_id, &a.task_id).cmp(&(&b.topic_id, &b.job_id, &b.task_id))
    });
    let total = entries.len();
    let entries = entries
        .into_iter()
        .skip(page.offset)
        .take(page.size)
        .collect();

    tracing::debug!(owner = %owner, total, "inbox collected");
    Ok(InboxPage { total, entries })
}

//! Human-readable dump of the Topic → Job → Task → unit hierarchy.

use crate::core::definition::{Owner, TaskDefinition};
use crate::core::hierarchy::{Job, Task, Topic};
use crate::core::ids::{JobId, OwnerId, TaskDefinitionId, TaskId, TaskUnitId, TopicId};
use crate::core::topo::topological_sort;
use crate::core::unit::TaskUnit;
use std::collections::HashMap;

/// Borrowed view over every record the tree is drawn from.
#[derive(Debug, Clone, Copy)]
pub struct TreeView<'a> {
    pub owners: &'a HashMap<OwnerId, Owner>,
    pub definitions: &'a HashMap<TaskDefinitionId, TaskDefinition>,
    pub topics: &'a HashMap<TopicId, Topic>,
    pub jobs: &'a HashMap<JobId, Job>,
    pub tasks: &'a HashMap<TaskId, Task>,
    pub units: &'a HashMap<TaskUnitId, TaskUnit>,
}

const INDENT: &str = "    ";

/// Render assigned records only; drafts never appear.
///
/// Units are listed in dependency order. Each unit is indented one level
/// deeper than its deepest dependency. A task whose units cannot be sorted
/// shows the error in place of its units.
pub fn render_tree(view: TreeView<'_>) -> String {
    let mut out = String::from("Topics:\n");

    let mut topics: Vec<&Topic> = view.topics.values().collect();
    topics.sort_by(|a, b| a.key.cmp(&b.key));

    for topic in topics {
        let deprecated = if topic.deprecated { " [deprecated]" } else { "" };
        out.push_str(&format!("- {}{}\n  Jobs:\n", topic.name, deprecated));

        for job in topic.job_ids.iter().filter_map(|id| view.jobs.get(id)) {
            out.push_str(&format!("  - {} ({})\n    Tasks:\n", job.key, job.status));

            for task in job.task_ids.iter().filter_map(|id| view.tasks.get(id)) {
                out.push_str(&format!("    - {} ({})\n      Task Units:\n", task.key, task.status));
                render_units(&mut out, view, task);
            }
        }
    }

    out
}

fn render_units(out: &mut String, view: TreeView<'_>, task: &Task) {
    let units: Vec<&TaskUnit> = task
        .task_unit_ids
        .iter()
        .filter_map(|id| view.units.get(id))
        .collect();

    let order = match topological_sort(units.iter().copied()) {
        Ok(order) => order,
        Err(e) => {
            out.push_str(&format!("      error: {}\n", e));
            return;
        }
    };

    let mut depths: HashMap<&TaskUnitId, usize> = HashMap::with_capacity(order.len());
    for id in &order {
        let Some(unit) = view.units.get(id) else {
            continue;
        };
        let depth = unit
            .depends_on_ids
            .iter()
            .filter_map(|dependency| depths.get(dependency))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depths.insert(&unit.key, depth);

        let label = describe(view, unit);
        out.push_str(&format!(
            "      {}- {} ({}){}\n",
            INDENT.repeat(depth),
            unit.key,
            unit.status,
            label
        ));
    }
}

fn describe(view: TreeView<'_>, unit: &TaskUnit) -> String {
    let Some(definition) = unit
        .definition_id
        .as_ref()
        .and_then(|id| view.definitions.get(id))
    else {
        return String::new();
    };
    match view.owners.get(&definition.owner_id) {
        Some(owner) => format!(": {} @ {}", definition.name, owner.name),
        None => format!(": {}", definition.name),
    }
}

//! Depth-first topological sort over persisted task units.

use crate::core::ids::TaskUnitId;
use crate::core::unit::TaskUnit;
use crate::error::{EntityKind, Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Sorter<'a> {
    units: HashMap<&'a TaskUnitId, &'a TaskUnit>,
    marks: HashMap<&'a TaskUnitId, Mark>,
    order: Vec<TaskUnitId>,
}

impl<'a> Sorter<'a> {
    fn visit(&mut self, id: &'a TaskUnitId) -> Result<()> {
        match self.marks.get(id).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(Error::CyclicDependency { unit: id.clone() });
            }
            Mark::Unvisited => {}
        }

        let unit = *self
            .units
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, id))?;

        self.marks.insert(id, Mark::InProgress);
        for dependency in &unit.depends_on_ids {
            if !self.units.contains_key(dependency) {
                return Err(Error::not_found(EntityKind::TaskUnit, dependency));
            }
            self.visit(dependency)?;
        }
        self.marks.insert(id, Mark::Done);
        self.order.push(id.clone());
        Ok(())
    }
}

/// Order `units` so every dependency precedes its dependents.
///
/// Roots are visited in input order. The first back edge found aborts the
/// sort with [`Error::CyclicDependency`]; no partial order is returned.
pub fn topological_sort<'a>(
    units: impl IntoIterator<Item = &'a TaskUnit>,
) -> Result<Vec<TaskUnitId>> {
    let input: Vec<&'a TaskUnit> = units.into_iter().collect();
    let mut sorter = Sorter {
        units: input.iter().map(|&unit| (&unit.key, unit)).collect(),
        marks: HashMap::with_capacity(input.len()),
        order: Vec::with_capacity(input.len()),
    };

    for &unit in &input {
        sorter.visit(&unit.key)?;
    }

    tracing::trace!(units = sorter.order.len(), "topological sort complete");
    Ok(sorter.order)
}

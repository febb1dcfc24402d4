//! Work unit DAG for a single task.
//!
//! `WorkUnitDag` binds a task's units to the generic [`Graph`]. Edges point
//! from a dependency to its dependent: `connect(a, b)` means `b` waits for
//! `a`. The graph accepts any edge; [`WorkUnitDag::validate`] is the final
//! cycle check once construction is done.

use crate::core::definition::TaskDefinition;
use crate::core::graph::{Graph, Vertex, VertexRef};
use crate::core::ids::{IdSource, OwnerId, TaskDefinitionId, TaskId, TaskUnitId, UuidIds};
use crate::core::status::{Command, Status};
use crate::core::topo::topological_sort;
use crate::core::unit::{TaskUnit, TaskUnitConfig};
use crate::error::{EntityKind, Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A task unit together with its resolved definition.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitNode {
    pub unit: TaskUnit,
    /// `None` when the definition could not be resolved on rebuild.
    pub definition: Option<TaskDefinition>,
}

impl UnitNode {
    pub fn key(&self) -> &TaskUnitId {
        &self.unit.key
    }

    pub fn status(&self) -> Status {
        self.unit.status
    }

    pub fn owner_id(&self) -> Option<&OwnerId> {
        self.definition.as_ref().map(|definition| &definition.owner_id)
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.owner_id() == Some(owner)
    }
}

/// Vertex payload stored in the scheduling graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DagNode {
    Unit(UnitNode),
}

impl DagNode {
    pub fn as_unit(&self) -> Option<&UnitNode> {
        match self {
            DagNode::Unit(node) => Some(node),
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut UnitNode> {
        match self {
            DagNode::Unit(node) => Some(node),
        }
    }
}

impl Vertex for DagNode {
    fn vertex_id(&self) -> &str {
        match self {
            DagNode::Unit(node) => node.unit.key.as_str(),
        }
    }

    fn metadata(&self) -> &BTreeMap<String, String> {
        match self {
            DagNode::Unit(node) => &node.unit.data,
        }
    }

    fn merge_metadata(&mut self, metadata: BTreeMap<String, String>) {
        match self {
            DagNode::Unit(node) => node.unit.data.extend(metadata),
        }
    }
}

/// Template for vertices sharing one definition. Every
/// [`WorkUnitDag::spawn`] yields a new vertex with a fresh key.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFactory {
    definition: TaskDefinition,
    task_id: Option<TaskId>,
}

impl UnitFactory {
    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    /// Stamp spawned units with the task they belong to.
    pub fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// Explicit configuration for [`WorkUnitDag::add_unit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    pub key: Option<TaskUnitId>,
    pub definition: Option<TaskDefinition>,
    pub status: Option<Status>,
    pub data: BTreeMap<String, String>,
    pub error: Option<String>,
    pub commands: Vec<Command>,
    pub task_id: Option<TaskId>,
}

impl NodeConfig {
    pub fn with_key(mut self, key: TaskUnitId) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_definition(mut self, definition: TaskDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    fn into_node(self, key: TaskUnitId) -> UnitNode {
        let mut config = TaskUnitConfig::default().with_data(self.data);
        if let Some(definition) = &self.definition {
            config = config.with_definition(definition.key.clone());
        }
        if let Some(status) = self.status {
            config = config.with_status(status);
        }
        if let Some(task_id) = self.task_id {
            config = config.with_task(task_id);
        }
        let mut unit = TaskUnit::new(key, config);
        unit.error = self.error;
        unit.commands = self.commands;
        UnitNode {
            unit,
            definition: self.definition,
        }
    }
}

/// Flat, persisted form of a DAG with id → position lookups.
///
/// `depends_on` and `dependents` are answered from the index instead of
/// back-references stored on the units.
#[derive(Debug, Clone, Default)]
pub struct UnitIndex {
    units: Vec<TaskUnit>,
    positions: HashMap<TaskUnitId, usize>,
    dependents: HashMap<TaskUnitId, Vec<usize>>,
}

impl UnitIndex {
    pub fn new(units: Vec<TaskUnit>) -> Self {
        let positions = units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.key.clone(), i))
            .collect();
        let mut dependents: HashMap<TaskUnitId, Vec<usize>> = HashMap::new();
        for (i, unit) in units.iter().enumerate() {
            for dependency in &unit.depends_on_ids {
                dependents.entry(dependency.clone()).or_default().push(i);
            }
        }
        Self {
            units,
            positions,
            dependents,
        }
    }

    pub fn get(&self, id: &TaskUnitId) -> Option<&TaskUnit> {
        self.positions.get(id).map(|&i| &self.units[i])
    }

    /// Units `id` waits for. Ids missing from the index are skipped.
    pub fn depends_on(&self, id: &TaskUnitId) -> Vec<&TaskUnit> {
        self.get(id)
            .map(|unit| {
                unit.depends_on_ids
                    .iter()
                    .filter_map(|dependency| self.get(dependency))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Units waiting for `id`.
    pub fn dependents(&self, id: &TaskUnitId) -> Vec<&TaskUnit> {
        self.dependents
            .get(id)
            .map(|found| found.iter().map(|&i| &self.units[i]).collect())
            .unwrap_or_default()
    }

    pub fn units(&self) -> &[TaskUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<TaskUnit> {
        self.units
    }

    pub fn topological_order(&self) -> Result<Vec<TaskUnitId>> {
        topological_sort(&self.units)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Scheduling graph of one task's units.
pub struct WorkUnitDag {
    graph: Graph<DagNode>,
    ids: Arc<dyn IdSource>,
}

impl WorkUnitDag {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            graph: Graph::new(),
            ids,
        }
    }

    fn mint_key(&self) -> Result<TaskUnitId> {
        self.ids.new_id().map(TaskUnitId::new)
    }

    /// The single place a graph vertex is cast to a unit.
    pub fn node(&self, vertex: VertexRef) -> Result<&UnitNode> {
        self.graph
            .get(vertex)
            .and_then(DagNode::as_unit)
            .ok_or_else(|| mismatch(vertex))
    }

    fn node_mut(&mut self, vertex: VertexRef) -> Result<&mut UnitNode> {
        self.graph
            .get_mut(vertex)
            .and_then(DagNode::as_unit_mut)
            .ok_or_else(|| mismatch(vertex))
    }

    pub fn find(&self, key: &TaskUnitId) -> Option<VertexRef> {
        self.graph.find(key.as_str())
    }

    /// Units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = (VertexRef, &UnitNode)> + '_ {
        self.graph.vertices().filter_map(move |vertex| {
            self.graph
                .get(vertex)
                .and_then(DagNode::as_unit)
                .map(|node| (vertex, node))
        })
    }

    pub fn unit_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn has_edge(&self, from: VertexRef, to: VertexRef) -> bool {
        self.graph.has_edge(from, to)
    }

    pub fn ancestors_of(&self, vertex: VertexRef) -> Result<Vec<VertexRef>> {
        self.node(vertex)?;
        Ok(self.graph.immediate_ancestors(vertex))
    }

    pub fn descendants_of(&self, vertex: VertexRef) -> Result<Vec<VertexRef>> {
        self.node(vertex)?;
        Ok(self.graph.immediate_descendants(vertex))
    }

    // ========== Construction ==========

    /// A reusable factory for vertices of `definition`.
    pub fn deferred_vertex(&self, definition: &TaskDefinition) -> UnitFactory {
        UnitFactory {
            definition: definition.clone(),
            task_id: None,
        }
    }

    /// Allocate a new vertex from `factory` with a fresh key and status none.
    pub fn spawn(&mut self, factory: &UnitFactory) -> Result<VertexRef> {
        let mut config = NodeConfig::default().with_definition(factory.definition.clone());
        if let Some(task_id) = &factory.task_id {
            config = config.with_task(task_id.clone());
        }
        self.add_unit(config)
    }

    /// Allocate one vertex from explicit configuration. A key is minted
    /// when the configuration carries none.
    pub fn add_unit(&mut self, config: NodeConfig) -> Result<VertexRef> {
        let key = match &config.key {
            Some(key) => key.clone(),
            None => self.mint_key()?,
        };
        if self.graph.find(key.as_str()).is_some() {
            return Err(Error::duplicate_id(EntityKind::TaskUnit, &key));
        }

        tracing::trace!(unit = %key, "adding unit vertex");
        let node = config.into_node(key);
        Ok(self.graph.add(DagNode::Unit(node)))
    }

    /// Declare that `to` depends on `from`.
    pub fn connect(&mut self, from: VertexRef, to: VertexRef) -> Result<()> {
        self.node(from)?;
        self.node(to)?;
        self.graph.connect(from, to)
    }

    /// Start a chain: spawn both vertices and connect them.
    pub fn connect_new(
        &mut self,
        from: &UnitFactory,
        to: &UnitFactory,
    ) -> Result<(VertexRef, VertexRef)> {
        let source = self.spawn(from)?;
        let target = self.spawn(to)?;
        self.graph.connect(source, target)?;
        Ok((source, target))
    }

    /// Extend a chain from an existing vertex.
    pub fn extend(&mut self, from: VertexRef, to: &UnitFactory) -> Result<VertexRef> {
        self.node(from)?;
        let target = self.spawn(to)?;
        self.graph.connect(from, target)?;
        Ok(target)
    }

    /// Fan-in: spawn one vertex depending on every vertex in `from`.
    pub fn join(&mut self, from: &[VertexRef], to: &UnitFactory) -> Result<VertexRef> {
        for &source in from {
            self.node(source)?;
        }
        let target = self.spawn(to)?;
        for &source in from {
            self.graph.connect(source, target)?;
        }
        Ok(target)
    }

    // ========== Scheduling ==========

    fn ancestors_succeeded(&self, vertex: VertexRef) -> bool {
        self.graph
            .immediate_ancestors(vertex)
            .into_iter()
            .all(|ancestor| {
                self.node(ancestor)
                    .map(|node| node.status() == Status::Success)
                    .unwrap_or(false)
            })
    }

    /// Units with status none whose immediate ancestors all succeeded.
    pub fn available_units(&self) -> Vec<VertexRef> {
        self.units()
            .filter(|(vertex, node)| {
                node.status() == Status::None && self.ancestors_succeeded(*vertex)
            })
            .map(|(vertex, _)| vertex)
            .collect()
    }

    /// [`Self::available_units`] restricted to units `owner` is responsible
    /// for. Units without a definition are visible to nobody.
    pub fn available_units_for_owner(&self, owner: &OwnerId) -> Vec<VertexRef> {
        self.units()
            .filter(|(vertex, node)| {
                node.is_owned_by(owner)
                    && node.status() == Status::None
                    && self.ancestors_succeeded(*vertex)
            })
            .map(|(vertex, _)| vertex)
            .collect()
    }

    /// Whether the unit may move to another status right now.
    pub fn can_change_status(&self, vertex: VertexRef) -> Result<bool> {
        let node = self.node(vertex)?;
        Ok(node.status().is_open() && self.ancestors_succeeded(vertex))
    }

    pub fn can_change_status_for_owner(&self, vertex: VertexRef, owner: &OwnerId) -> Result<bool> {
        let node = self.node(vertex)?;
        Ok(node.is_owned_by(owner) && self.can_change_status(vertex)?)
    }

    /// Check and apply a transition. Returns `false` and leaves the unit
    /// untouched when the transition is not allowed.
    pub fn set_status(&mut self, vertex: VertexRef, status: Status) -> Result<bool> {
        if !self.can_change_status(vertex)? {
            tracing::debug!(vertex = %vertex, to = %status, "status change refused");
            return Ok(false);
        }
        let node = self.node_mut(vertex)?;
        tracing::debug!(unit = %node.unit.key, from = %node.unit.status, to = %status, "status changed");
        node.unit.status = status;
        Ok(true)
    }

    /// [`Self::set_status`] on behalf of `owner`, who must own the unit.
    pub fn set_status_as(
        &mut self,
        vertex: VertexRef,
        owner: &OwnerId,
        status: Status,
    ) -> Result<bool> {
        let node = self.node(vertex)?;
        if !node.is_owned_by(owner) {
            return Err(Error::InvalidOwner {
                owner: owner.clone(),
                key: node.unit.key.to_string(),
            });
        }
        self.set_status(vertex, status)
    }

    // ========== Persistence ==========

    /// Flatten into persisted units with `depends_on_ids` taken from the
    /// graph's edges.
    pub fn materialize(&self) -> UnitIndex {
        let units = self
            .units()
            .map(|(vertex, node)| {
                let mut unit = node.unit.clone();
                if let Some(definition) = &node.definition {
                    unit.definition_id = Some(definition.key.clone());
                }
                unit.depends_on_ids = self
                    .graph
                    .immediate_ancestors(vertex)
                    .into_iter()
                    .filter_map(|ancestor| self.node(ancestor).ok())
                    .map(|ancestor| ancestor.unit.key.clone())
                    .collect();
                unit
            })
            .collect();
        UnitIndex::new(units)
    }

    /// Rebuild a graph from persisted units, the inverse of
    /// [`Self::materialize`].
    ///
    /// Each unit keeps its status, error, data, command log and task. Edges
    /// are replayed from `depends_on_ids`; an id that names no unit of the
    /// input is [`Error::NotFound`]. No cycle check happens here.
    pub fn rebuild(
        ids: Arc<dyn IdSource>,
        units: impl IntoIterator<Item = TaskUnit>,
        definitions: &HashMap<TaskDefinitionId, TaskDefinition>,
    ) -> Result<Self> {
        let mut dag = Self::new(ids);
        let mut pending = Vec::new();

        for unit in units {
            let definition = unit
                .definition_id
                .as_ref()
                .and_then(|id| definitions.get(id))
                .cloned();
            if unit.definition_id.is_some() && definition.is_none() {
                tracing::debug!(unit = %unit.key, "definition missing on rebuild");
            }
            if dag.graph.find(unit.key.as_str()).is_some() {
                return Err(Error::duplicate_id(EntityKind::TaskUnit, &unit.key));
            }
            let dependencies: Vec<TaskUnitId> = unit.depends_on_ids.iter().cloned().collect();
            let vertex = dag.graph.add(DagNode::Unit(UnitNode { unit, definition }));
            pending.push((vertex, dependencies));
        }

        for (vertex, dependencies) in pending {
            for dependency in dependencies {
                let source = dag
                    .find(&dependency)
                    .ok_or_else(|| Error::not_found(EntityKind::TaskUnit, &dependency))?;
                dag.graph.connect(source, vertex)?;
            }
        }

        tracing::trace!(units = dag.unit_count(), edges = dag.edge_count(), "rebuilt unit dag");
        Ok(dag)
    }

    /// Materialize and sort; fails with [`Error::CyclicDependency`] if the
    /// edges added so far contain a cycle.
    pub fn validate(&self) -> Result<Vec<TaskUnitId>> {
        self.materialize().topological_order()
    }
}

impl Default for WorkUnitDag {
    fn default() -> Self {
        Self::new(Arc::new(UuidIds))
    }
}

impl std::fmt::Debug for WorkUnitDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let edges: Vec<(String, String)> = self
            .graph
            .edges()
            .filter_map(|(from, to)| {
                let from = self.node(from).ok()?;
                let to = self.node(to).ok()?;
                Some((from.key().to_string(), to.key().to_string()))
            })
            .collect();
        f.debug_struct("WorkUnitDag")
            .field("units", &self.unit_count())
            .field("edges", &edges)
            .finish()
    }
}

fn mismatch(vertex: VertexRef) -> Error {
    Error::VertexTypeMismatch(format!("vertex {} does not resolve to a task unit", vertex))
}

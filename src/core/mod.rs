//! Core domain models for dependency-gated scheduling.
//!
//! This module contains the entity hierarchy, the generic graph primitive,
//! the per-task work unit DAG and the owner inbox built on top of it.

pub mod dag;
pub mod definition;
pub mod graph;
pub mod hierarchy;
pub mod ids;
pub mod inbox;
pub mod status;
pub mod topo;
pub mod unit;

pub use dag::{DagNode, NodeConfig, UnitFactory, UnitIndex, UnitNode, WorkUnitDag};
pub use definition::{Owner, OwnerConfig, TaskDefinition, TaskDefinitionConfig, TaskDefinitionUpdate};
pub use graph::{Graph, Vertex, VertexRef};
pub use hierarchy::{Job, JobConfig, Task, Topic, TopicConfig, TopicCounters};
pub use ids::{
    IdSource, JobId, OwnerId, SequentialIds, TaskDefinitionId, TaskId, TaskUnitId, TopicId,
    UuidIds,
};
pub use inbox::{collect_inbox, InboxEntry, InboxPage, InboxView, Page};
pub use status::{Command, CommandKind, Status};
pub use topo::topological_sort;
pub use unit::{TaskUnit, TaskUnitConfig, UnitEdit};

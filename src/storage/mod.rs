//! Persistence contract consumed by the scheduling core.
//!
//! Backends own identity generation and persistence. Every method is
//! synchronous and reports failures to the immediate caller; nothing is
//! retried internally.

pub mod memory;
pub mod render;

pub use crate::core::ids::{IdSource, SequentialIds, UuidIds};
pub use memory::MemoryStore;

use crate::core::definition::{Owner, TaskDefinition, TaskDefinitionUpdate};
use crate::core::hierarchy::{Job, Task, Topic};
use crate::core::ids::{JobId, OwnerId, TaskDefinitionId, TaskId, TaskUnitId, TopicId};
use crate::core::inbox::{InboxPage, Page};
use crate::core::status::{Command, Status};
use crate::core::unit::TaskUnit;
use crate::error::Result;

pub trait Storage: IdSource {
    // ========== Creation ==========
    //
    // Records are stored as drafts: parent links and child id lists on the
    // input are cleared, assignment is the only way to set them.

    fn create_owner(&self, owner: Owner) -> Result<()>;

    fn create_task_definition(&self, definition: TaskDefinition) -> Result<()>;

    fn create_topic(&self, topic: Topic) -> Result<()>;

    fn create_job(&self, job: Job) -> Result<()>;

    fn create_task(&self, task: Task) -> Result<()>;

    /// Insert a batch of units. The whole batch is validated before any
    /// unit is stored.
    fn create_task_units(&self, units: Vec<TaskUnit>) -> Result<Vec<TaskUnitId>>;

    // ========== Assignment ==========
    //
    // Single-shot: linking an already linked child fails with
    // `AlreadyAssigned`.

    fn assign_job(&self, topic: &TopicId, job: &JobId) -> Result<()>;

    fn assign_task(&self, job: &JobId, task: &TaskId) -> Result<()>;

    /// Link draft units to a task. The task's units, including the batch,
    /// must stay a closed DAG: a dependency on a unit outside the task fails
    /// with `NotFound` and a cycle with `CyclicDependency`, leaving the task
    /// untouched.
    fn assign_task_units(&self, task: &TaskId, units: &[TaskUnitId]) -> Result<()>;

    // ========== Read-back ==========

    fn owner(&self, id: &OwnerId) -> Result<Owner>;

    fn owners(&self) -> Result<Vec<Owner>>;

    fn task_definition(&self, id: &TaskDefinitionId) -> Result<TaskDefinition>;

    fn task_definitions(&self) -> Result<Vec<TaskDefinition>>;

    /// The topic with its assigned jobs and unit status counters.
    fn topic(&self, id: &TopicId) -> Result<Topic>;

    fn topics(&self) -> Result<Vec<Topic>>;

    fn job(&self, id: &JobId) -> Result<Job>;

    fn jobs(&self, topic: &TopicId) -> Result<Vec<Job>>;

    fn task(&self, id: &TaskId) -> Result<Task>;

    fn tasks(&self, job: &JobId) -> Result<Vec<Task>>;

    fn task_unit(&self, id: &TaskUnitId) -> Result<TaskUnit>;

    fn task_units(&self, task: &TaskId) -> Result<Vec<TaskUnit>>;

    fn has_owner(&self, id: &OwnerId) -> bool;

    fn has_task_definition(&self, id: &TaskDefinitionId) -> bool;

    fn has_topic(&self, id: &TopicId) -> bool;

    fn has_job(&self, id: &JobId) -> bool;

    fn has_task(&self, id: &TaskId) -> bool;

    fn has_task_unit(&self, id: &TaskUnitId) -> bool;

    // ========== Updates ==========

    fn update_owner(&self, id: &OwnerId, name: &str) -> Result<Owner>;

    /// Only the owning owner may update a definition.
    fn update_task_definition(
        &self,
        owner: &OwnerId,
        id: &TaskDefinitionId,
        update: TaskDefinitionUpdate,
    ) -> Result<TaskDefinition>;

    fn update_topic(&self, id: &TopicId, name: &str) -> Result<Topic>;

    fn update_job_status(&self, id: &JobId, status: Status) -> Result<()>;

    fn update_task_status(&self, id: &TaskId, status: Status) -> Result<()>;

    /// Write a unit status directly, without ancestor gating. `error` is
    /// kept only for [`Status::Error`].
    fn update_task_unit_status(
        &self,
        id: &TaskUnitId,
        status: Status,
        error: Option<String>,
    ) -> Result<()>;

    // ========== Lifecycle ==========

    fn deprecate_owner(&self, id: &OwnerId) -> Result<Owner>;

    fn deprecate_task_definition(&self, id: &TaskDefinitionId) -> Result<()>;

    fn deprecate_topic(&self, id: &TopicId) -> Result<()>;

    /// Fail the job and every queued or in-progress unit below it. Returns
    /// the number of units canceled.
    fn cancel_job(&self, id: &JobId) -> Result<usize>;

    fn cancel_task(&self, id: &TaskId) -> Result<usize>;

    /// Apply a client command to a unit on behalf of `owner`. Returns
    /// whether the gated transition was accepted.
    fn submit_command(&self, owner: &OwnerId, unit: &TaskUnitId, command: Command)
        -> Result<bool>;

    fn inbox(&self, owner: &OwnerId, page: Page) -> Result<InboxPage>;
}

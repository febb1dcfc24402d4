pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod observe;
pub mod storage;

pub use crate::core::{
    Command, CommandKind, InboxEntry, InboxPage, Job, JobConfig, Owner, OwnerConfig, Page,
    Status, Task, TaskDefinition, TaskDefinitionConfig, TaskUnit, TaskUnitConfig, Topic,
    TopicConfig, WorkUnitDag,
};
pub use config::Config;
pub use error::{EntityKind, Error, Result};
pub use storage::{MemoryStore, Storage};

use thiserror::Error;

use crate::core::ids::{OwnerId, TaskId, TaskUnitId};

/// The kind of record an error or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Owner,
    TaskDefinition,
    Topic,
    Job,
    Task,
    TaskUnit,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Owner => write!(f, "owner"),
            EntityKind::TaskDefinition => write!(f, "task definition"),
            EntityKind::Topic => write!(f, "topic"),
            EntityKind::Job => write!(f, "job"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::TaskUnit => write!(f, "task unit"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{kind} with id {key} already exists")]
    DuplicateId { kind: EntityKind, key: String },

    #[error("{kind} with name {name:?} already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    #[error("owner {owner} does not own {key}")]
    InvalidOwner { owner: OwnerId, key: String },

    #[error("task {0} has no job (draft task reached inbox computation)")]
    OrphanTask(TaskId),

    #[error("cyclic dependency detected at task unit {unit}")]
    CyclicDependency { unit: TaskUnitId },

    #[error("vertex is not a task unit: {0}")]
    VertexTypeMismatch(String),

    #[error("{kind} {key} is already assigned")]
    AlreadyAssigned { kind: EntityKind, key: String },

    #[error("{kind} {key} is a draft and has not been assigned")]
    Unassigned { kind: EntityKind, key: String },

    #[error("{kind} {key} is still referenced and cannot be deprecated")]
    InUse { kind: EntityKind, key: String },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Id generation failed: {0}")]
    IdGeneration(String),
}

impl Error {
    pub(crate) fn not_found(kind: EntityKind, key: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn duplicate_id(kind: EntityKind, key: impl std::fmt::Display) -> Self {
        Error::DuplicateId {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn duplicate_name(kind: EntityKind, name: &str) -> Self {
        Error::DuplicateName {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn already_assigned(kind: EntityKind, key: impl std::fmt::Display) -> Self {
        Error::AlreadyAssigned {
            kind,
            key: key.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

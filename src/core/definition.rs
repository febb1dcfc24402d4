//! Owners and the task definitions they are responsible for.

use crate::core::ids::{OwnerId, TaskDefinitionId};
use serde::{Deserialize, Serialize};

/// Optional fields applied on top of a new [`Owner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerConfig {
    pub description: Option<String>,
}

impl OwnerConfig {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An actor capable of completing task units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub key: OwnerId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Owner {
    pub fn new(key: OwnerId, name: impl Into<String>, config: OwnerConfig) -> Self {
        let mut owner = Self {
            key,
            name: name.into(),
            description: String::new(),
        };
        if let Some(description) = config.description {
            owner.description = description;
        }
        owner
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

/// Optional fields applied on top of a new [`TaskDefinition`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDefinitionConfig {
    pub description: Option<String>,
    pub details: Option<String>,
    pub identifier: Option<String>,
}

impl TaskDefinitionConfig {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Organization-wide identifier such as `metal.provisioning`.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// Reusable template for a unit of work, owned by exactly one [`Owner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub key: TaskDefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub identifier: String,
    pub owner_id: OwnerId,
}

impl TaskDefinition {
    pub fn new(
        key: TaskDefinitionId,
        name: impl Into<String>,
        owner_id: OwnerId,
        config: TaskDefinitionConfig,
    ) -> Self {
        let mut definition = Self {
            key,
            name: name.into(),
            description: String::new(),
            details: String::new(),
            identifier: String::new(),
            owner_id,
        };
        definition.configure(config);
        definition
    }

    /// Apply every field set in `config`, leaving the others untouched.
    pub fn configure(&mut self, config: TaskDefinitionConfig) {
        if let Some(description) = config.description {
            self.description = description;
        }
        if let Some(details) = config.details {
            self.details = details;
        }
        if let Some(identifier) = config.identifier {
            self.identifier = identifier;
        }
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }

    pub fn update(&mut self, update: TaskDefinitionUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        self.configure(update.config);
    }
}

/// Changes an owner may make to one of its definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDefinitionUpdate {
    pub name: Option<String>,
    pub config: TaskDefinitionConfig,
}

impl TaskDefinitionUpdate {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.config = self.config.with_description(description);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.config = self.config.with_details(details);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config = self.config.with_identifier(identifier);
        self
    }
}

//! Newtype keys for every record in the hierarchy.
//!
//! Keys are plain strings so storage backends can bring their own id
//! scheme; `generate` mints a UUID v4 string for the common case.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing key.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new random key.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// First 8 characters, for human-readable output.
            pub fn short(&self) -> &str {
                self.0.get(..8).unwrap_or(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifies an actor able to complete task units.
    OwnerId
);
string_id!(
    /// Identifies a reusable task template.
    TaskDefinitionId
);
string_id!(
    /// Identifies a topic, the top of the hierarchy.
    TopicId
);
string_id!(
    /// Identifies a job inside a topic.
    JobId
);
string_id!(
    /// Identifies a task, which is one DAG instance.
    TaskId
);
string_id!(
    /// Identifies a single vertex of a task's DAG.
    TaskUnitId
);

/// Mints fresh keys for new records.
pub trait IdSource: Send + Sync {
    fn new_id(&self) -> Result<String>;
}

/// Random UUID v4 keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn new_id(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }
}

/// Deterministic `prefix-N` keys, numbered from 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdSource for SequentialIds {
    fn new_id(&self) -> Result<String> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}-{}", self.prefix, n))
    }
}

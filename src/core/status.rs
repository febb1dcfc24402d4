//! Status state machine and the command log entries that drive it.
//!
//! A unit starts at `None`. `Success` and `Error` are terminal. Whether a
//! unit may move at all is decided by ancestor gating in
//! [`crate::core::dag::WorkUnitDag`]; this module only knows which states
//! are open.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a task unit (also reused for tasks and jobs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Created, nothing happened yet.
    #[default]
    None,
    /// Picked up for dispatch.
    Queued,
    /// Being worked on by its owner.
    InProgress,
    /// Finished successfully. Terminal.
    Success,
    /// Finished with an error. Terminal.
    Error,
    /// Temporarily halted by its owner.
    Pause,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::None,
        Status::Queued,
        Status::InProgress,
        Status::Success,
        Status::Error,
        Status::Pause,
    ];

    /// `Success` and `Error` accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }

    /// States a unit may still leave (subject to ancestor gating).
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::None => "none",
            Status::Queued => "queued",
            Status::InProgress => "in-progress",
            Status::Success => "success",
            Status::Error => "error",
            Status::Pause => "pause",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

/// What a client reports about a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Progress,
    Success,
    Error,
    Pause,
    /// Informational entry, no status change.
    Log,
}

impl CommandKind {
    /// Status the unit moves to when the command is accepted.
    pub fn target_status(&self) -> Option<Status> {
        match self {
            CommandKind::Progress => Some(Status::InProgress),
            CommandKind::Success => Some(Status::Success),
            CommandKind::Error => Some(Status::Error),
            CommandKind::Pause => Some(Status::Pause),
            CommandKind::Log => None,
        }
    }
}

/// One entry of a unit's append-only command log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub details: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    pub issued_at: DateTime<Utc>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            details: String::new(),
            data: BTreeMap::new(),
            issued_at: Utc::now(),
        }
    }

    pub fn progress() -> Self {
        Self::new(CommandKind::Progress)
    }

    pub fn success() -> Self {
        Self::new(CommandKind::Success)
    }

    /// An error report; `details` doubles as the unit's error payload.
    pub fn error(details: impl Into<String>) -> Self {
        Self::new(CommandKind::Error).with_details(details)
    }

    pub fn pause() -> Self {
        Self::new(CommandKind::Pause)
    }

    pub fn log(details: impl Into<String>) -> Self {
        Self::new(CommandKind::Log).with_details(details)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn target_status(&self) -> Option<Status> {
        self.kind.target_status()
    }

    /// Error payload carried to the unit when this command is applied.
    pub fn error_payload(&self) -> Option<String> {
        match self.kind {
            CommandKind::Error => Some(self.details.clone()),
            _ => None,
        }
    }
}

//! Structured store events and the sinks that receive them.
//!
//! A storage backend reports every mutation to an injected [`EventSink`]
//! instead of printing. Sinks never fail: a sink that cannot deliver an
//! event logs a warning and carries on.
//!
//! - `TracingSink` - emits each event as a `tracing` debug event (default)
//! - `NoopSink` - drops everything
//! - `MemorySink` - keeps events in memory, for tests and embedding
//! - `JsonLinesSink` - one JSON object per line to any writer
//! - `CompositeSink` - fan-out to several sinks

use crate::core::ids::{OwnerId, TaskUnitId};
use crate::core::status::{CommandKind, Status};
use crate::error::EntityKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// What happened in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEventKind {
    Created {
        kind: EntityKind,
        key: String,
    },
    Assigned {
        kind: EntityKind,
        key: String,
        parent: String,
    },
    Updated {
        kind: EntityKind,
        key: String,
    },
    StatusChanged {
        kind: EntityKind,
        key: String,
        from: Status,
        to: Status,
    },
    CommandApplied {
        unit: TaskUnitId,
        owner: OwnerId,
        command: CommandKind,
        accepted: bool,
    },
    Deprecated {
        kind: EntityKind,
        key: String,
    },
    Canceled {
        kind: EntityKind,
        key: String,
        units: usize,
    },
    InboxServed {
        owner: OwnerId,
        entries: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StoreEventKind,
}

impl StoreEvent {
    pub fn now(kind: StoreEventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: &StoreEvent);

    /// Sink name for diagnostics.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &StoreEvent) {
        tracing::debug!(target: "workdag::store", at = %event.at, event = ?event.kind, "store event");
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &StoreEvent) {}

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StoreEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<StoreEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &StoreEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Writes each event as a single JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn record(&self, event: &StoreEvent) {
        let mut writer = self.writer.lock();
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to write store event");
        }
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }
}

pub struct CompositeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for CompositeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sinks.iter().map(|sink| sink.name()).collect();
        f.debug_struct("CompositeSink").field("sinks", &names).finish()
    }
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for CompositeSink {
    fn record(&self, event: &StoreEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

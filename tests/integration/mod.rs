//! Integration test suite for workdag.
//!
//! These tests drive the public API end to end: DAGs are built with the
//! factory helpers, persisted through a `MemoryStore`, and scheduled through
//! owner commands and inboxes.
//!
//! # Test Categories
//!
//! - `scheduling`: Linear chains, fan-in, ownership filtering, draft safety
//! - `inbox`: Owner inbox grouping, ordering and pagination
//! - `storage_contract`: Create/assign/update/deprecate/cancel semantics
//! - `recovery`: Materialize/rebuild and restart from persisted units
//! - `properties`: Randomized DAG invariants
//!
//! # CI Compatibility
//!
//! Everything runs in memory with deterministic id sources; nothing touches
//! the network and only config tests use a temporary directory.

mod fixtures;

mod recovery;
mod properties;
